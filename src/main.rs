use anyhow::{Context, Result};
use arrow::util::pretty::pretty_format_batches;
use bicycle_id::analysis::eigen::ModeKind;
use bicycle_id::analysis::response::Output;
use bicycle_id::analysis::stats::mean;
use bicycle_id::{Config, Session};
use log::{error, info};

fn main() -> Result<()> {
    env_logger::init();

    let config = Config::from_env().context("reading configuration")?;
    let session = match Session::open(&config) {
        Ok(session) => session,
        Err(e) if e.is_input_error() => {
            error!("Could not load runs: {e}");
            return Err(e).context("loading run data");
        }
        Err(e) => return Err(e).context("building first-principles models"),
    };
    info!("{} of {} runs match", session.subset().len(), session.collection().len());

    print_coefficients(&session)?;
    print_bode(&session)?;
    print_root_locus(&session)?;
    Ok(())
}

fn print_coefficients(session: &Session) -> Result<()> {
    let view = session.coefficient_view()?;

    println!("== Experimental coefficients ({} runs) ==", view.experimental.len());
    if view.experimental.is_empty() {
        println!("no matching runs");
    } else {
        println!("{}", pretty_format_batches(&[view.experimental.to_record_batch()?])?);
    }

    for (rider, table) in &view.models {
        println!("== {rider} Whipple model ==");
        println!("{}", pretty_format_batches(&[table.to_record_batch()?])?);
    }
    Ok(())
}

fn print_bode(session: &Session) -> Result<()> {
    let view = session.bode_view()?;
    println!("== Bode (steer torque input) ==");
    let Some(summary) = view.experimental else {
        println!("no matching runs");
        return Ok(());
    };

    println!(
        "{} runs, speed {:.2} ± {:.2} m/s",
        summary.run_count, summary.mean_speed, summary.std_speed
    );
    let grid = session.collection().grid().as_slice();
    for output in Output::ALL {
        let k = output.index();
        let low = 0;
        let high = grid.len() - 1;
        println!(
            "  {:<12} {:>8.3} rad/s: {:>7.2} ± {:.2} dB {:>8.1} ± {:.1} deg",
            output.label(),
            grid[low],
            summary.mean_magnitude_db[low][k],
            summary.std_magnitude_db[low][k],
            summary.mean_phase_deg[low][k],
            summary.std_phase_deg[low][k],
        );
        println!(
            "  {:<12} {:>8.3} rad/s: {:>7.2} ± {:.2} dB {:>8.1} ± {:.1} deg",
            "",
            grid[high],
            summary.mean_magnitude_db[high][k],
            summary.std_magnitude_db[high][k],
            summary.mean_phase_deg[high][k],
            summary.std_phase_deg[high][k],
        );
    }

    for (rider, response) in &view.models {
        let peak = response
            .magnitude_of(Output::RollAngle)
            .into_iter()
            .map(|m| 20.0 * m.log10())
            .fold(f64::NEG_INFINITY, f64::max);
        println!("  {rider} model at {:.2} m/s: peak roll {peak:.2} dB", summary.mean_speed);
    }
    Ok(())
}

fn print_root_locus(session: &Session) -> Result<()> {
    let view = session.root_locus_view()?;
    println!("== Root locus ==");
    if view.experimental.is_empty() {
        println!("no matching runs");
    } else {
        let points = view.experimental.locus_points();
        let weave: Vec<f64> = points
            .iter()
            .filter(|p| p.mode == ModeKind::Oscillatory && p.value.im > 0.0)
            .map(|p| p.value.re)
            .collect();
        println!(
            "{} runs, {} oscillatory eigenvalue pairs, mean real part {:.3}",
            view.experimental.len(),
            weave.len(),
            mean(&weave)
        );
    }

    for (rider, points) in &view.models {
        let stable_from = points
            .chunks(4)
            .find(|speed| speed.iter().all(|p| p.is_stable()))
            .map(|speed| speed[0].speed);
        match stable_from {
            Some(v) => println!("  {rider} model: first self-stable speed {v:.2} m/s"),
            None => println!("  {rider} model: not self-stable in range"),
        }
    }
    Ok(())
}
