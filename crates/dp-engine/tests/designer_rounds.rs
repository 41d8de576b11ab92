//! End-to-end rounds of the experiment designer.
//!
//! Responses come from closed-form surfaces so every round is reproducible.

use dp_engine::{DesignSheet, DesignerConfig, DpError, ExperimentDesigner, Phase, ResponseSheet};
use dp_types::{EdgePolicy, FactorSpec, ResponseSpec};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn two_factor_config(design: &str, low: f64, high: f64) -> DesignerConfig {
    DesignerConfig::new(design)
        .with_factor("x", FactorSpec::new(low, high))
        .with_factor("y", FactorSpec::new(low, high))
        .with_response("yield", ResponseSpec::maximize())
}

fn measure(sheet: &DesignSheet, f: impl Fn(f64, f64) -> f64) -> ResponseSheet {
    let x = sheet.column("x").unwrap();
    let y = sheet.column("y").unwrap();
    ResponseSheet::single("yield", x.iter().zip(y).map(|(x, y)| f(*x, *y)).collect())
}

fn peak(px: f64, py: f64) -> impl Fn(f64, f64) -> f64 {
    move |x, y| 100.0 - (x - px).powi(2) - (y - py).powi(2)
}

#[test]
fn unknown_design_fails_at_construction() {
    init_tracing();
    let json = r#"{
        "factors": {"x": {"low_init": 0, "high_init": 10}},
        "design_type": "nonsense",
        "responses": {"yield": {"criterion": "maximize"}}
    }"#;
    let config = DesignerConfig::from_json_str(json).unwrap();
    match ExperimentDesigner::new(config) {
        Err(DpError::UnsupportedDesign(name)) => assert_eq!(name, "nonsense"),
        other => panic!("expected UnsupportedDesign, got {other:?}"),
    }
}

#[test]
fn invalid_settings_fail_fast() {
    let json = r#"{
        "factors": {"x": {"low_init": 0, "high_init": 10}},
        "design_type": "ccf",
        "responses": {"yield": {"criterion": "maximize"}},
        "at_edges": "explode"
    }"#;
    assert!(DesignerConfig::from_json_str(json).is_err());

    let config = two_factor_config("ccf", 0.0, 10.0).with_relative_step(Some(1.5));
    assert!(matches!(
        ExperimentDesigner::new(config),
        Err(DpError::Validation(_))
    ));

    let config = two_factor_config("ccf", 0.0, 10.0)
        .with_factor("n", FactorSpec::new(0.5, 3.0).with_type("ordinal"));
    assert!(ExperimentDesigner::new(config).is_err());

    let config = two_factor_config("ccf", 0.0, 10.0)
        .with_factor("c", FactorSpec::new(0.0, 1.0).with_type("binary"));
    assert!(matches!(
        ExperimentDesigner::new(config),
        Err(DpError::UnsupportedFactorType(_))
    ));
}

#[test]
fn centered_optimum_converges_and_keeps_factors() {
    init_tracing();
    let mut designer = ExperimentDesigner::new(two_factor_config("ccf", 0.0, 10.0)).unwrap();
    let before = designer.factors().clone();

    let sheet = designer.new_design().unwrap();
    let result = designer
        .update_factors_from_response(&measure(&sheet, peak(5.0, 5.0)), 2, 0.25)
        .unwrap();

    assert!(result.converged);
    assert_eq!(result.tol, 0.25);
    assert!((result.optimum("x").unwrap() - 5.0).abs() < 1e-3);
    assert!((result.optimum("y").unwrap() - 5.0).abs() < 1e-3);
    assert_eq!(designer.factors(), &before);
}

#[test]
fn optimum_near_edge_moves_the_design() {
    let mut designer = ExperimentDesigner::new(two_factor_config("ccf", 0.0, 10.0)).unwrap();

    let sheet = designer.new_design().unwrap();
    let result = designer
        .update_factors_from_response(&measure(&sheet, peak(9.0, 5.0)), 2, 0.25)
        .unwrap();

    assert!(!result.converged);
    assert!((result.optimum("x").unwrap() - 9.0).abs() < 1e-3);
    let x = designer.factors().get("x").unwrap();
    assert!((x.current_low().unwrap() - 2.5).abs() < 1e-3);
    assert!((x.current_high().unwrap() - 12.5).abs() < 1e-3);
    let y = designer.factors().get("y").unwrap();
    assert!((y.center().unwrap() - 5.0).abs() < 1e-3);
    assert!((y.span().unwrap() - 10.0).abs() < 1e-12);
}

#[test]
fn factors_of_different_magnitude_find_the_edge_optimum() {
    init_tracing();
    let config = DesignerConfig::new("ccf")
        .with_factor("x", FactorSpec::new(400.0, 800.0))
        .with_factor("y", FactorSpec::new(0.004, 0.008))
        .with_response("yield", ResponseSpec::maximize());
    let mut designer = ExperimentDesigner::new(config).unwrap();

    let sheet = designer.new_design().unwrap();
    let surface =
        |x: f64, y: f64| 100.0 - ((x - 780.0) / 100.0).powi(2) - ((y - 0.0065) / 0.001).powi(2);
    let result = designer
        .update_factors_from_response(&measure(&sheet, surface), 2, 0.25)
        .unwrap();

    assert!((result.optimum("x").unwrap() - 780.0).abs() < 1e-2);
    assert!((result.optimum("y").unwrap() - 0.0065).abs() < 1e-7);
    // (800 - 780) / 400 = 0.05 lies outside the band
    assert!(!result.converged);
    let x = designer.factors().get("x").unwrap();
    assert!(x.center().unwrap() > 600.0);
    assert!((x.span().unwrap() - 400.0).abs() < 1e-9);
}

#[test]
fn quadratic_surface_converges_over_rounds() {
    init_tracing();
    let mut designer = ExperimentDesigner::new(two_factor_config("ccf", 0.0, 4.0)).unwrap();
    let surface = peak(7.0, 6.0);

    let mut rounds = 0;
    let result = loop {
        rounds += 1;
        assert!(rounds <= 20, "no convergence after 20 rounds");
        let sheet = designer.new_design().unwrap();
        let result = designer
            .update_factors_from_response(&measure(&sheet, &surface), 2, 0.25)
            .unwrap();
        if result.converged {
            break result;
        }
    };

    assert!(rounds > 1);
    assert!((result.optimum("x").unwrap() - 7.0).abs() < 1e-2);
    assert!((result.optimum("y").unwrap() - 6.0).abs() < 1e-2);
    assert_eq!(designer.history().len(), rounds);
    assert!(designer.history().iter().all(|r| r.phase == Phase::Optimization));

    for name in ["x", "y"] {
        let factor = designer.factors().get(name).unwrap();
        assert!((factor.span().unwrap() - 4.0).abs() < 1e-9);
    }
}

#[test]
fn screening_runs_exactly_once() {
    init_tracing();
    let config = DesignerConfig::new("ccf")
        .with_factor("x", FactorSpec::new(5.0, 15.0).with_bounds(0.0, 20.0))
        .with_factor("y", FactorSpec::new(5.0, 15.0).with_bounds(0.0, 20.0))
        .with_response("yield", ResponseSpec::maximize())
        .with_skip_screening(false);
    let mut designer = ExperimentDesigner::new(config).unwrap();
    assert_eq!(designer.phase(), Phase::Screening);

    let sheet = designer.new_design().unwrap();
    let levels: Vec<f64> = vec![0.0, 5.0, 10.0, 15.0, 20.0];
    assert!(sheet.column("x").unwrap().iter().all(|v| levels.contains(v)));

    let result = designer.update(&measure(&sheet, peak(19.0, 12.0))).unwrap();
    assert!(!result.converged);
    assert_eq!(result.tol, 0.0);
    assert_eq!(result.optimum("x"), Some(20.0));
    assert_eq!(result.optimum("y"), Some(10.0));
    assert_eq!(designer.phase(), Phase::Optimization);

    let x = designer.factors().get("x").unwrap();
    assert_eq!((x.current_low(), x.current_high()), (Some(15.0), Some(20.0)));
    let y = designer.factors().get("y").unwrap();
    assert_eq!((y.current_low(), y.current_high()), (Some(5.0), Some(15.0)));

    let sheet = designer.new_design().unwrap();
    assert_eq!(sheet.n_rows(), 9);
    designer.update(&measure(&sheet, peak(19.0, 12.0))).unwrap();
    assert_eq!(designer.phase(), Phase::Optimization);

    let history = designer.history();
    assert_eq!(history[0].phase, Phase::Screening);
    assert_eq!(history[0].next_phase, Phase::Optimization);
    assert_eq!(history[1].phase, Phase::Optimization);

    designer.rollback_to(0).unwrap();
    assert_eq!(designer.phase(), Phase::Screening);
}

#[test]
fn ordinal_factor_moves_in_whole_steps() {
    let config = DesignerConfig::new("fullfactorial3levels")
        .with_factor("n", FactorSpec::new(2.0, 6.0).with_type("ordinal"))
        .with_response("yield", ResponseSpec::maximize());
    let mut designer = ExperimentDesigner::new(config).unwrap();

    let sheet = designer.new_design().unwrap();
    assert_eq!(sheet.column("n").unwrap(), &[2.0, 4.0, 6.0]);

    let response = ResponseSheet::single(
        "yield",
        sheet.column("n").unwrap().iter().map(|n| -(n - 9.0).powi(2)).collect(),
    );
    let result = designer.update(&response).unwrap();
    assert!(!result.converged);

    let n = designer.factors().get("n").unwrap();
    assert_eq!((n.current_low(), n.current_high()), (Some(3.0), Some(7.0)));
}

#[test]
fn shrink_policy_is_not_implemented() {
    let config = two_factor_config("ccc", 0.0, 10.0).with_edge_policy(EdgePolicy::Shrink);
    let mut designer = ExperimentDesigner::new(config).unwrap();
    assert!(matches!(
        designer.new_design(),
        Err(DpError::NotImplemented(_))
    ));

    let config = two_factor_config("ccc", 0.0, 10.0);
    let mut designer = ExperimentDesigner::new(config).unwrap();
    let sheet = designer.new_design().unwrap();
    assert!(sheet.column("x").unwrap().iter().all(|v| *v >= 0.0));
}

#[test]
fn several_response_columns_are_not_implemented() {
    let mut designer = ExperimentDesigner::new(two_factor_config("ccf", 0.0, 10.0)).unwrap();
    let sheet = designer.new_design().unwrap();
    let rows = vec![vec![1.0, 2.0]; sheet.n_rows()];
    let response = ResponseSheet::from_rows(vec!["a".into(), "b".into()], &rows).unwrap();
    assert!(matches!(
        designer.update(&response),
        Err(DpError::NotImplemented(_))
    ));
}

#[test]
fn sheets_round_trip_through_csv() {
    let config =
        two_factor_config("boxbehnken", 0.0, 10.0).with_factor("z", FactorSpec::new(0.0, 10.0));
    let mut designer = ExperimentDesigner::new(config).unwrap();
    let sheet = designer.new_design().unwrap();

    let mut buf = Vec::new();
    sheet.write_csv(&mut buf).unwrap();
    let parsed = DesignSheet::from_csv_reader(buf.as_slice()).unwrap();
    assert_eq!(parsed, sheet);

    let mut csv = String::from("yield\n");
    for row in sheet.rows() {
        let value = 100.0 - row.iter().map(|v| (v - 5.0).powi(2)).sum::<f64>();
        csv.push_str(&format!("{value}\n"));
    }
    let response = ResponseSheet::from_csv_reader(csv.as_bytes()).unwrap();
    let result = designer.update(&response).unwrap();
    assert!(result.converged);
}
