use detrital::mixture::parse_summary;
use detrital::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::Write;

fn config() -> DistributionConfig {
    DistributionConfig::new().axis(AxisSpec::fixed(0.0, 3000.0, 1.0))
}

#[test]
fn csv_samples_to_mixture_summary() {
    let dir = tempfile::tempdir().unwrap();
    let write = |name: &str, rows: &[(f64, f64)]| {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "Sample\tAge\tErr").unwrap();
        for (age, err) in rows {
            writeln!(f, "{}\t{}\t{}", name, age, err).unwrap();
        }
        path
    };
    let young = write("young.txt", &[(180.0, 6.0), (205.0, 7.0), (221.0, 7.0), (260.0, 8.0)]);
    let old = write("old.txt", &[(1480.0, 30.0), (1530.0, 31.0), (1610.0, 33.0)]);

    let parents = vec![
        Population::from_csv(&young, b'\t', "age", "err", &config()).unwrap(),
        Population::from_csv(&old, b'\t', "AGE", "ERR", &config()).unwrap(),
    ];
    let daughters = vec![
        Population::from_mixture(&parents, &[0.35, 0.65]).unwrap(),
        Population::from_mixture(&parents, &[0.9, 0.1]).unwrap(),
    ];

    let mut set = MixtureModelSet::new(&daughters, &parents, &Metric::Likeness)
        .unwrap()
        .step(0.05)
        .order(MixtureOrder::Reverse)
        .parent_names(&["young", "old"])
        .daughter_names(&["A", "B"]);
    set.simulate().unwrap();

    let trends = set.trends().unwrap();
    assert!((trends[0][0] - 0.35).abs() < 1e-9);
    assert!((trends[1][0] - 0.9).abs() < 1e-9);

    let path = dir.path().join("summary.txt");
    set.export_summary(&path, "\t").unwrap();
    let summary = parse_summary(&std::fs::read_to_string(&path).unwrap(), "\t").unwrap();
    assert_eq!(summary.objective, "mixture_Likeness");
    assert_eq!(summary.objective.parse::<Metric>().unwrap(), Metric::Likeness);
    assert_eq!(summary.parents, vec![("young".to_string(), 4), ("old".to_string(), 3)]);
    assert_eq!(summary.daughters[1].name, "B");
    assert_eq!(summary.daughters[1].coefficients, vec![0.9, 0.1]);
    assert!((summary.daughters[0].value - 1.0).abs() < 5e-3);
}

#[test]
fn best_mixture_rebuilds_daughter() {
    let mut rng = StdRng::seed_from_u64(21);
    let parents: Vec<Population> = [(300.0, 50.0), (900.0, 60.0), (1900.0, 100.0)]
        .iter()
        .map(|&(mean, sd)| {
            Population::from_sample(Sample::from_normal(mean, sd, 15.0, 100, &mut rng).unwrap(), &config())
                .unwrap()
        })
        .collect();
    let daughter = Population::from_mixture(&parents, &[0.5, 0.25, 0.25]).unwrap();
    let mut model = MixtureModel::new(&daughter, &parents, &Metric::Vmax)
        .unwrap()
        .step(0.25);
    model.simulate().unwrap();
    assert_eq!(model.fits().len(), 15);
    let rebuilt = model.mixed_population(0).unwrap();
    assert_eq!(
        rebuilt.density().unwrap().values(),
        daughter.density().unwrap().values()
    );
    assert_eq!(metrics::vmax(&daughter, &rebuilt).unwrap(), 0.0);
}

#[test]
fn foreign_axis_fails_every_consumer() {
    let a = Population::from_arrays(vec![100.0, 200.0], vec![5.0, 5.0], &config()).unwrap();
    let coarse = DistributionConfig::new().axis(AxisSpec::fixed(0.0, 3000.0, 10.0));
    let b = Population::from_arrays(vec![100.0, 200.0], vec![5.0, 5.0], &coarse).unwrap();
    assert!(matches!(metrics::dmax(&a, &b), Err(DzError::AxisMismatch(_))));
    assert!(matches!(
        Population::from_mixture(&[a.clone(), b.clone()], &[0.5, 0.5]),
        Err(DzError::AxisMismatch(_))
    ));
    assert!(matches!(
        MixtureModel::new(&a, &[b], &Metric::Dmax),
        Err(DzError::AxisMismatch(_))
    ));
}

#[test]
fn permutation_with_custom_objective() {
    let mut rng = StdRng::seed_from_u64(8);
    let a = Sample::from_normal(400.0, 30.0, 10.0, 40, &mut rng).unwrap();
    let b = Sample::from_normal(1200.0, 30.0, 10.0, 40, &mut rng).unwrap();
    let combined = ObjectiveFn::new("Dmax + Vmax", |x: &Population, y: &Population| {
        Ok(metrics::dmax(x, y)? + metrics::vmax(x, y)?)
    });
    let result = PermutationTest::new(true)
        .iterations(150)
        .seed(4)
        .evaluate(&a, &b, &combined)
        .unwrap();
    assert_eq!(result.objective(), "Dmax + Vmax");
    assert_eq!(result.true_value(), 2.0);
    assert_eq!(result.p_value(), 0.0);
    assert!(result.value_for_p(0.05).unwrap() < result.true_value());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("null.csv");
    result.record(&path).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 151);
}

#[test]
fn pooled_samples_round_trip_through_labels() {
    let a = Sample::new(vec![1.0, 2.0, 3.0], vec![0.1, 0.2, 0.3]).unwrap();
    let b = Sample::new(vec![10.0, 20.0], vec![1.0, 2.0]).unwrap();
    let pooled = Sample::pool(&a, &b);
    let labels = [true, true, true, false, false];
    assert_eq!(pooled.select(&labels, true).unwrap(), a);
    assert_eq!(pooled.select(&labels, false).unwrap(), b);
}
