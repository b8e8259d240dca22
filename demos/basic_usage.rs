// ============================================================================
// Basic Usage Example
// ============================================================================

use lab_measure::prelude::*;
use std::sync::Arc;

fn main() -> MeasureResult<()> {
    #[cfg(feature = "logging")]
    lab_measure::utils::init_tracing(tracing::Level::DEBUG);

    println!("=== Lab Measure Example ===\n");

    // Single measurements
    let length = Measurement::new(1.1, 0.3, "m")?;
    let width = Measurement::new(22.2, 0.4, "cm")?;
    println!("length        = {}", length);
    println!("width         = {}", width);
    println!("length + width = {}", (&length + &width)?);
    println!("area          = {}", &length * &width);
    println!("area in LaTeX = {}", (&length * &width).to_latex());
    println!("length - length = {}\n", (&length - &length)?);

    // Custom units live for the rest of the process
    register_unit("L", "m^3", 1e-3)?;
    let volume = Measurement::new(2.5, 0.1, "mL")?;
    println!("volume        = {}", volume.to_str("cm^3")?);

    // Lists and table rows
    let voltage = MeasurementList::new(&[1.3, 3.0, 5.0, 7.0, 8.5, 10.0], 1.0, "V")?;
    let temperature = MeasurementList::new(
        &[23.0, 55.0, 67.0, 82.0, 88.0, 96.0],
        vec![5.0, 3.0, 7.0, 10.0, 5.0, 6.0],
        "K",
    )?;
    println!("\nvoltage row:     {}", voltage.table_print(TableParts::Both));
    println!("temperature row: {}", temperature.table_print(TableParts::Both));

    // Linear regression
    let line = LinearRegression::fit(&voltage, &temperature)?;
    println!("\nLinear fit:\n{}", line);
    let at = Measurement::new(6.0, 0.2, "V")?;
    println!("T(6 V) = {}", line.predict(&at)?);

    // Nonlinear regression with a logging observer
    let time = MeasurementList::new(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0], 0.0, "s")?;
    let counts = MeasurementList::new(&[100.0, 61.0, 37.0, 22.0, 14.0, 8.0], 2.0, "Hz")?;
    let decay = NonlinearFitBuilder::new()
        .model(
            FnModel::new(2, |t: f64, p: &[f64]| p[0] * (-t / p[1]).exp())
                .with_name("decay")
                .with_parameter_names(["N0", "tau"]),
        )
        .initial_guess(vec![90.0, 1.5])
        .observer(Arc::new(LoggingFitObserver))
        .fit(&time, &counts)?;

    println!("\nNonlinear fit:\n{}", decay);
    let report = decay.report();
    println!(
        "iterations = {}, chi^2 = {:.3}, weighted = {}",
        report.iterations, report.chi_squared, report.weighted
    );

    let curve = decay.curve(5)?;
    for i in 0..curve.len() {
        println!(
            "t = {:6.3}  f = {:8.3}  band = [{:8.3}, {:8.3}]",
            curve.x[i], curve.prediction[i], curve.lower[i], curve.upper[i]
        );
    }

    Ok(())
}
