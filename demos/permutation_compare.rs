use detrital::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
/// Runs permutation tests on a pair of similar samples and a pair of distinct samples
/// with several objective functions.
fn main() -> Result<(), DzError> {
    pretty_env_logger::init();
    let mut rng = StdRng::seed_from_u64(42);

    let a = Sample::from_normal(600.0, 150.0, 15.0, 80, &mut rng)?;
    let b = Sample::from_normal(620.0, 150.0, 15.0, 80, &mut rng)?;
    let c = Sample::from_normal(1400.0, 200.0, 25.0, 80, &mut rng)?;

    let config = DistributionConfig::new().axis(AxisSpec::new().dt(2.0));
    // (objective, larger values mean more different)
    let tests = [
        (Metric::Dmax, true),
        (Metric::Vmax, true),
        (Metric::Likeness, false),
        (Metric::CorrelationCoefficient, false),
    ];

    for (metric, larger) in tests.iter() {
        let test = PermutationTest::new(*larger)
            .iterations(500)
            .seed(7)
            .config(config.clone());
        for (label, other) in [("similar", &b), ("distinct", &c)].iter() {
            let result = test.evaluate(&a, other, metric)?;
            println!(
                "{:<10} {:<8} observed {:.4}  p = {:.3}  critical(0.05) = {:.4}",
                metric.as_str(),
                label,
                result.true_value(),
                result.p_value(),
                result.value_for_p(0.05)?
            );
        }
    }
    Ok(())
}
