mod synthetic;

use clap::{Parser, Subcommand};
use nalgebra::Vector2;
use psha_core::directivity::{run_directivity, FaultSource, Plane, SiteGrid};
use psha_core::disagg::run_ensemble_disagg;
use psha_core::gms::{run_gms, GcimSource, GmsRequest, InMemoryGMDataset};
use psha_core::hazard::run_ensemble_hazard;
use psha_core::uhs::run_uhs;
use psha_core::{
    CalculationConfig, Ensemble, HazardQuery, ResultStore, RuptureId, SiteInfo, IM,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Seismic hazard engine demo on synthetic or file-based inputs
#[derive(Parser, Debug)]
#[command(name = "psha-demo")]
#[command(about = "Probabilistic seismic hazard analysis demo", long_about = None)]
struct Args {
    /// Calculation settings (JSON); defaults for anything not listed
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ensemble file (JSON); a synthetic ensemble is generated when absent
    #[arg(short, long)]
    ensemble: Option<PathBuf>,

    /// Station name
    #[arg(long, default_value = "CCCC")]
    station: String,

    /// Site latitude
    #[arg(long, default_value_t = -43.53, allow_hyphen_values = true)]
    lat: f64,

    /// Site longitude
    #[arg(long, default_value_t = 172.63, allow_hyphen_values = true)]
    lon: f64,

    /// Site Vs30 (m/s)
    #[arg(long, default_value_t = 400.0)]
    vs30: f64,

    /// Seed for synthetic inputs and stochastic calculations
    #[arg(short, long, default_value_t = 1)]
    seed: u64,

    /// Save results below this directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Ensemble hazard curve
    Hazard {
        /// Intensity measure, e.g. PGA or pSA_1.0
        #[arg(long, default_value = "PGA")]
        im: IM,
    },
    /// Rupture disaggregation
    Disagg {
        #[arg(long, default_value = "pSA_1.0")]
        im: IM,
        /// Annual exceedance probability
        #[arg(long, conflicts_with = "im_level")]
        exceedance: Option<f64>,
        /// IM level
        #[arg(long)]
        im_level: Option<f64>,
        /// Number of ruptures to list
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Uniform hazard spectra
    Uhs {
        /// Annual exceedance probabilities
        #[arg(long, value_delimiter = ',', default_value = "0.0021,0.000404")]
        exceedances: Vec<f64>,
    },
    /// Ground-motion selection
    Gms {
        /// Conditioning IM
        #[arg(long, default_value = "pSA_1.0")]
        im_j: IM,
        /// Annual exceedance probability of the conditioning IM
        #[arg(long, default_value_t = 1.0 / 475.0)]
        exceedance: f64,
        /// Candidate dataset (JSON); synthetic when absent
        #[arg(long)]
        dataset: Option<PathBuf>,
        /// Size of the synthetic dataset
        #[arg(long, default_value_t = 5000)]
        n_records: usize,
    },
    /// Scenario spectrum of one rupture
    Scenario {
        /// Rupture id
        #[arg(long, default_value = "fault_000")]
        rupture: String,
    },
    /// Hypocentre-averaged directivity around a single-plane fault
    Directivity {
        #[arg(long, default_value_t = 7.2)]
        magnitude: f64,
        #[arg(long, default_value_t = 180.0)]
        rake: f64,
        /// Strike (degrees)
        #[arg(long, default_value_t = 0.0)]
        strike: f64,
        #[arg(long, default_value_t = 90.0)]
        dip: f64,
        /// Length along strike (km)
        #[arg(long, default_value_t = 60.0)]
        length: f64,
        /// Down-dip width (km)
        #[arg(long, default_value_t = 15.0)]
        width: f64,
        /// Grid points per side
        #[arg(long, default_value_t = 11)]
        grid: usize,
        /// Periods (s)
        #[arg(long, value_delimiter = ',', default_value = "1.0,3.0,5.0")]
        periods: Vec<f64>,
    },
}

fn load_ensemble(path: Option<&Path>, site: &SiteInfo, rng: &mut StdRng) -> psha_core::Result<Ensemble> {
    let ensemble = match path {
        Some(path) => Ensemble::from_json_file(path)?,
        None => synthetic::ensemble(site, rng)?,
    };
    info!("Loaded ensemble {}", ensemble.name);
    Ok(ensemble)
}

fn directivity(
    source: &FaultSource,
    grid: usize,
    periods: &[f64],
    config: &CalculationConfig,
    seed: u64,
    store: Option<&ResultStore>,
) -> psha_core::Result<()> {
    let mut rng = StdRng::seed_from_u64(config.hypocentre.seed.unwrap_or(seed));
    let sites = SiteGrid::around(&source.planes, 30.0, grid);
    let result = run_directivity(source, &sites.sites, periods, &config.hypocentre, &mut rng)?;

    println!(
        "{} ({:?}), {} hypocentres, {}x{} sites",
        source.name,
        source.rupture_type(),
        result.n_hypo,
        sites.nx,
        sites.ny
    );
    for (j, period) in periods.iter().enumerate() {
        let column = result.fd.column(j);
        println!(
            "  T = {:>5.2} s   fD min {:>7.3}  max {:>7.3}  peak amplification {:.2}",
            period,
            column.min(),
            column.max(),
            column.max().exp()
        );
    }
    if let Some(store) = store {
        let path = store.save_directivity(&source.name, &result)?;
        println!("\nSaved {}", path.display());
    }
    Ok(())
}

fn main() -> psha_core::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => CalculationConfig::from_json_file(path)?,
        None => CalculationConfig::default(),
    };

    let site = SiteInfo::new(args.station.as_str(), args.lat, args.lon, args.vs30);
    let mut rng = StdRng::seed_from_u64(args.seed);
    let store = args.output.as_ref().map(ResultStore::new);
    let ensemble_path = args.ensemble.as_deref();

    println!("=== PSHA Demo ===\n");

    match args.mode {
        Mode::Hazard { im } => {
            let ensemble = load_ensemble(ensemble_path, &site, &mut rng)?;
            let result = run_ensemble_hazard(&ensemble, &site, &im, &config.hazard, None)?;
            println!("Hazard for {im} at {} ({} branches)", site.station_name, result.branches.len());
            println!("{:>10} {:>12} {:>12} {:>12}", "IM", "mean", "fault", "ds");
            let curve = &result.curve;
            let step = (curve.im_values().len() / 20).max(1);
            for i in (0..curve.im_values().len()).step_by(step) {
                println!(
                    "{:>10.4} {:>12.4e} {:>12.4e} {:>12.4e}",
                    curve.im_values()[i],
                    curve.total()[i],
                    curve.fault()[i],
                    curve.ds()[i]
                );
            }
            for return_period in [475.0, 2475.0] {
                match result.exceedance_to_im(1.0 / return_period) {
                    Ok(v) => println!("{return_period:>6} yr: {im} = {v:.4}"),
                    Err(e) => println!("{return_period:>6} yr: {e}"),
                }
            }
            if let Some(store) = &store {
                store.save_hazard(&result)?;
            }
        }
        Mode::Disagg {
            im,
            exceedance,
            im_level,
            top,
        } => {
            let ensemble = load_ensemble(ensemble_path, &site, &mut rng)?;
            let query = match (exceedance, im_level) {
                (None, None) => HazardQuery::exceedance(1.0 / 475.0)?,
                (e, v) => HazardQuery::from_options(e, v)?,
            };
            let result = run_ensemble_disagg(&ensemble, &site, &im, query, &config.hazard)?;
            println!(
                "Disaggregation of {im} at {} for {query}: IM level {:.4}",
                site.station_name, result.im_value
            );
            println!(
                "Mean Mw {:.2}, mean Rrup {:.1} km, mean epsilon {:.2}",
                result.summary.mean_magnitude, result.summary.mean_rrup, result.summary.mean_epsilon
            );
            println!("\n{:<12} {:>6} {:>8} {:>8} {:>12}", "rupture", "Mw", "Rrup", "eps", "contribution");
            for c in result.contributions.iter().take(top) {
                println!(
                    "{:<12} {:>6.2} {:>8.1} {:>8.2} {:>12.4}",
                    c.rupture_id.as_str(),
                    c.magnitude,
                    c.rrup.unwrap_or(f64::NAN),
                    c.epsilon,
                    c.contribution
                );
            }
            let grid = result.grid(&config.disagg_grid)?;
            println!(
                "\nGrid: {} magnitude x {} distance bins, fault share {:.3}",
                grid.mag_bin_edges.len() - 1,
                grid.rrup_bin_edges.len() - 1,
                grid.fault_grid.sum()
            );
            if let Some(store) = &store {
                store.save_disagg(&result)?;
            }
        }
        Mode::Uhs { exceedances } => {
            let ensemble = load_ensemble(ensemble_path, &site, &mut rng)?;
            let ims = synthetic::spectral_ims();
            let results = run_uhs(&ensemble, &site, &ims, &exceedances, &config.hazard)?;
            for uhs in &results {
                println!("UHS at {} for exceedance {:e}", uhs.station, uhs.exceedance);
                println!("{:>8} {:>10} {:>10} {:>10}", "T (s)", "p16", "mean", "p84");
                for i in 0..uhs.periods.len() {
                    println!(
                        "{:>8.2} {:>10.4} {:>10.4} {:>10.4}",
                        uhs.periods[i], uhs.p16[i], uhs.mean[i], uhs.p84[i]
                    );
                }
                println!();
                if let Some(store) = &store {
                    store.save_uhs(uhs)?;
                }
            }
        }
        Mode::Gms {
            im_j,
            exceedance,
            dataset,
            n_records,
        } => {
            let ensemble = load_ensemble(ensemble_path, &site, &mut rng)?;
            let dataset = match dataset {
                Some(path) => InMemoryGMDataset::from_json_file(path)?,
                None => synthetic::dataset(n_records, &mut rng),
            };
            let ims: Vec<IM> = synthetic::spectral_ims()
                .into_iter()
                .filter(|im| *im != im_j)
                .collect();
            let request = GmsRequest {
                site: &site,
                im_j,
                ims,
                query: HazardQuery::exceedance(exceedance)?,
                bounds: None,
                source: GcimSource::Parametric,
            };
            let result = run_gms(
                &ensemble,
                &dataset,
                &request,
                &config.gms,
                &config.causal,
                &config.hazard,
                &mut rng,
            )?;
            println!(
                "GMS {} at {}: {im_j} = {:.4}, {} candidates",
                result.id, result.station, result.im_j_value, result.n_candidates
            );
            println!(
                "Bounds: Mw [{:.2}, {:.2}], Rrup [{:.1}, {:.1}] km",
                result.bounds.magnitude.low,
                result.bounds.magnitude.high,
                result.bounds.rrup.low,
                result.bounds.rrup.high
            );
            println!("\n{:<10} {:>6} {:>8} {:>6} {:>8}", "record", "Mw", "Rrup", "SF", "misfit");
            for s in &result.selected {
                println!(
                    "{:<10} {:>6.2} {:>8.1} {:>6.2} {:>8.3}",
                    s.record_id, s.magnitude, s.rrup, s.scale_factor, s.misfit
                );
            }
            println!("\nKS critical value {:.3} (alpha {})", result.ks_critical_value, result.ks_alpha);
            for ks in &result.ks {
                println!("  {:<10} {:.3}", ks.im.to_string(), ks.statistic);
            }
            if let Some(store) = &store {
                store.save_gms(&result)?;
            }
        }
        Mode::Scenario { rupture } => {
            let ensemble = load_ensemble(ensemble_path, &site, &mut rng)?;
            let result = psha_core::run_scenario(
                &ensemble,
                &site,
                &RuptureId::from(rupture.as_str()),
                &synthetic::spectral_ims(),
            )?;
            println!("Scenario {} at {}", result.rupture_id.as_str(), result.station);
            println!("{:>10} {:>10} {:>10} {:>10} {:>8}", "IM", "p16", "median", "p84", "sigma");
            for im in &result.ims {
                println!(
                    "{:>10} {:>10.4} {:>10.4} {:>10.4} {:>8.3}",
                    im.im.to_string(),
                    im.p16,
                    im.median,
                    im.p84,
                    im.sigma_total
                );
            }
        }
        Mode::Directivity {
            magnitude,
            rake,
            strike,
            dip,
            length,
            width,
            grid,
            periods,
        } => {
            let source = FaultSource {
                name: "demo_fault".to_string(),
                planes: vec![Plane::new(Vector2::new(0.0, 0.0), strike, dip, length, width, 0.0)],
                magnitude,
                rake,
            };
            directivity(&source, grid, &periods, &config, args.seed, store.as_ref())?;
        }
    }

    Ok(())
}
