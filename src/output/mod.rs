use crate::error::PKResult;
use crate::simulation::Solution;
use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
struct ParameterRecord<'a> {
    generated_at: DateTime<Utc>,
    compartments: &'a [String],
    evaluation_points: usize,
    parameters: &'a serde_json::Value,
}

/// File name prefix for a solution's outputs.
fn prefix(solution: &Solution) -> String {
    solution.configuration().name().unwrap_or("solution").to_string()
}

/// Write trajectory, parameters and summary for `solution` into
/// `output_dir`. Returns the paths written.
pub fn save_solution<P: AsRef<Path>>(solution: &Solution, output_dir: P) -> PKResult<Vec<PathBuf>> {
    let output_path = output_dir.as_ref();
    let name = prefix(solution);

    let trajectory_path = output_path.join(format!("{}_solution.csv", name));
    save_trajectory(solution, &trajectory_path)?;

    let params_path = output_path.join(format!("{}_params.json", name));
    save_parameters(solution, &params_path)?;

    let summary_path = output_path.join(format!("{}_summary.csv", name));
    generate_summary(solution, &summary_path)?;

    info!("Results for '{}' saved to {:?}", name, output_path);
    Ok(vec![trajectory_path, params_path, summary_path])
}

fn save_trajectory<P: AsRef<Path>>(solution: &Solution, path: P) -> PKResult<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["TIME".to_string()];
    header.extend(solution.labels().iter().map(|l| l.to_uppercase()));
    writer.write_record(&header)?;

    let trajectory = solution.trajectory();
    for (col, time) in solution.times().iter().enumerate() {
        let mut record = vec![time.to_string()];
        record.extend(trajectory.column(col).iter().map(|q| q.to_string()));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

fn save_parameters<P: AsRef<Path>>(solution: &Solution, path: P) -> PKResult<()> {
    let record = ParameterRecord {
        generated_at: Utc::now(),
        compartments: solution.labels(),
        evaluation_points: solution.times().len(),
        parameters: solution.configuration().as_value(),
    };
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, &record)?;
    Ok(())
}

/// Per-compartment peak amount, time of peak and AUC.
pub fn generate_summary<P: AsRef<Path>>(solution: &Solution, path: P) -> PKResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in solution.summary() {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
