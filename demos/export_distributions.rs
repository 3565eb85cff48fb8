use detrital::prelude::*;
use detrital::population::write_density_table;
use rand::rngs::StdRng;
use rand::SeedableRng;
/// Writes density and cumulative estimates of three samples to a temporary directory.
fn main() -> Result<(), DzError> {
    pretty_env_logger::init();
    let mut rng = StdRng::seed_from_u64(3);
    let config = DistributionConfig::new()
        .axis(AxisSpec::fixed(0.0, 2000.0, 5.0))
        .density(DensityMethod::kde(25.0))
        .cumulative(CumulativeMethod::IntegratedDensity);

    let names = ["North", "South", "East"];
    let pops = vec![
        Population::from_sample(Sample::from_normal(400.0, 60.0, 10.0, 90, &mut rng)?, &config)?,
        Population::from_sample(Sample::from_normal(900.0, 90.0, 15.0, 90, &mut rng)?, &config)?,
        Population::from_sample(Sample::from_normal(1500.0, 50.0, 20.0, 90, &mut rng)?, &config)?,
    ];

    let dir = std::env::temp_dir().join(format!("detrital-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    for (name, pop) in names.iter().zip(&pops) {
        pop.export_density(dir.join(format!("{}_pdf.csv", name)), EstimateKind::Density, b',')?;
        pop.export_density(dir.join(format!("{}_cdf.csv", name)), EstimateKind::Cumulative, b',')?;
    }
    let table = std::fs::File::create(dir.join("densities.txt"))?;
    write_density_table(table, &names, &pops, b'\t', 1, 6)?;
    println!("wrote distributions to {}", dir.display());
    Ok(())
}
