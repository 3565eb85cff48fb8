use detrital::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
/// Fits mixtures of three synthetic parent populations to two synthetic daughters and
/// prints the best fits and a tab-delimited summary.
fn main() -> Result<(), DzError> {
    pretty_env_logger::init();
    let mut rng = StdRng::seed_from_u64(1000); // Seed for reproducibility.

    // Shared axis, required for every comparison.
    let config = DistributionConfig::new().axis(AxisSpec::fixed(0.0, 3500.0, 1.0));

    // Parent source areas.
    let parents = vec![
        Population::from_sample(Sample::from_normal(250.0, 40.0, 8.0, 120, &mut rng)?, &config)?,
        Population::from_sample(Sample::from_normal(1100.0, 80.0, 20.0, 120, &mut rng)?, &config)?,
        Population::from_sample(Sample::from_normal(2700.0, 120.0, 30.0, 120, &mut rng)?, &config)?,
    ];

    // Daughters drawn from the tabulated density of known mixtures.
    let truth = [[0.2, 0.5, 0.3], [0.6, 0.1, 0.3]];
    let mut daughters = Vec::new();
    for coefficients in truth.iter() {
        let mixed = Population::from_mixture(&parents, coefficients)?;
        let axis = mixed.density()?.axis().values().to_vec();
        let density = mixed.density()?.values().to_vec();
        daughters.push(Population::from_density(&axis, &density, 150, 0.02, &config, &mut rng)?);
    }

    let mut set = MixtureModelSet::new(&daughters, &parents, &Metric::Dmax)?
        .step(0.05) // Coefficient spacing.
        .order(MixtureOrder::Normal) // Small Dmax is a good fit.
        .parent_names(&["Coastal", "Interior", "Cratonic"])
        .daughter_names(&["Upper fan", "Lower fan"]);
    set.simulate()?;

    for (model, expected) in set.models().iter().zip(truth.iter()) {
        let best = model.best()?;
        println!(
            "{}: best {:?} (Dmax {:.4}), drawn from {:?}",
            model.name(),
            best.coefficients,
            best.value,
            expected
        );
    }

    let stdout = std::io::stdout();
    set.write_summary(&mut stdout.lock(), "\t")?;
    Ok(())
}
