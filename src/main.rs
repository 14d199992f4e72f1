use anyhow::{anyhow, bail, Context, Result};
use crossbeam::channel::{bounded, select, unbounded};
use indicatif::{ProgressBar, ProgressStyle};
use num_traits::cast::ToPrimitive;
use rep_grader::{
    grader::{Exercise, Grader, GradingResult},
    replay::{Frame, FrameReader},
    session::{WorkoutSession, WorkoutSummary},
};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};
use structopt::StructOpt;
use tracing::{debug, info};
use tracing_subscriber::layer::SubscriberExt;

#[derive(structopt::StructOpt)]
struct Opt {
    /// JSON-lines pose recording. Reads standard input when omitted.
    #[structopt(short, long)]
    input: Option<PathBuf>,

    /// Frame rate used to timestamp frames that do not carry one.
    #[structopt(short, long, default_value = "30")]
    fps: f64,

    #[structopt(short, long, default_value = "info", env = "RUST_LOG")]
    log_level: tracing_subscriber::filter::EnvFilter,

    #[structopt(subcommand)]
    exercise: Exercise,

    #[structopt(short, long)]
    show_progress: bool,
}

fn open_input(path: Option<&PathBuf>) -> Result<Box<dyn BufRead + Send>> {
    Ok(match path {
        Some(path) => Box::new(BufReader::new(File::open(path).with_context(|| {
            format!("failed opening pose recording {}", path.display())
        })?)),
        None => Box::new(BufReader::new(std::io::stdin())),
    })
}

fn frame_timestamp(index: usize, fps: f64) -> Result<Duration> {
    let index = index
        .to_f64()
        .ok_or_else(|| anyhow!("failed converting frame index {} to f64", index))?;
    Ok(Duration::from_secs_f64(index / fps))
}

fn main() -> Result<()> {
    let opt = Opt::from_args();

    tracing::subscriber::set_global_default(
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .with(opt.log_level),
    )?;

    if !(opt.fps.is_finite() && opt.fps > 0.0) {
        bail!("fps must be a positive number, got {}", opt.fps);
    }
    let fps = opt.fps;

    let input = open_input(opt.input.as_ref())?;

    let running = Arc::new(AtomicBool::new(true));
    let running_ctrl_c = running.clone();
    let (interrupt_tx, interrupt_rx) = bounded(1);

    ctrlc::set_handler(move || {
        running_ctrl_c.store(false, Ordering::SeqCst);
        let _ = interrupt_tx.try_send(());
    })
    .context("failed setting Ctrl-C handler")?;

    let pb_reps = if opt.show_progress {
        Some(
            ProgressBar::new_spinner().with_style(
                ProgressStyle::default_spinner()
                    .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
                    .template("{prefix:.bold.dim} {spinner} {wide_msg}"),
            ),
        )
    } else {
        None
    };

    let grader = opt.exercise.into_grader();
    let exercise = grader.exercise();
    info!(%exercise, fps, "grading started");

    let (frames_tx, frames_rx) = unbounded::<Frame>();
    let running_read = running.clone();

    // Detached so that an interrupted session does not wait on a blocked read.
    let reader = thread::spawn(move || {
        for frame in FrameReader::new(input) {
            if !running_read.load(Ordering::SeqCst) {
                break;
            }
            let frame = frame.context("failed reading pose recording")?;
            if frames_tx.send(frame).is_err() {
                // grading stopped early
                break;
            }
        }
        Ok::<_, anyhow::Error>(())
    });

    let mut session = WorkoutSession::new(grader);
    let mut index = 0;

    let interrupted = loop {
        let frame = select! {
            recv(frames_rx) -> frame => match frame {
                Ok(frame) => frame,
                Err(_) => break false,
            },
            recv(interrupt_rx) -> _ => break true,
        };

        let timestamp = match frame.timestamp {
            Some(timestamp) => timestamp,
            None => frame_timestamp(index, fps)?,
        };

        let result = session.process(&frame.snapshot, timestamp);
        match &result {
            GradingResult::InvalidPose { .. } | GradingResult::IncorrectForm { .. } => {
                debug!(frame = index, ?timestamp, feedback = ?result.feedback(), "form feedback")
            }
            _ => {}
        }

        if let Some(pb_reps) = pb_reps.as_ref() {
            pb_reps.set_message(format!(
                "{}: {} reps, {}",
                exercise,
                session.reps(),
                session.grader().current_phase_description(),
            ));
            pb_reps.inc(1);
        }

        index += 1;
    };

    if interrupted {
        info!(frames = index, "interrupted");
    } else {
        reader
            .join()
            .map_err(|_| anyhow!("pose reader thread panicked"))??;
    }

    let summary: WorkoutSummary = session.finish();

    if let Some(pb_reps) = pb_reps {
        pb_reps.finish_and_clear();
    }

    info!(
        %exercise,
        reps = summary.reps,
        attempts = summary.attempts,
        points = summary.points,
        "grading finished"
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&summary).context("failed serializing workout summary")?
    );

    Ok(())
}
