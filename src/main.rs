use pcbro::{
    activity,
    plot::{self, Heatmap},
    report, wires, Config, FrameStore, NpzStore,
};
use env_logger::Env;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "wirecell-pcbro",
    about = "PCB strip readout wire geometry and waveform frames"
)]
enum Opt {
    /// Generate an ideal "oneside wires" file
    ///
    /// columns: channel plane wire sx sy sz ex ey ez
    GenWires {
        /// Wire pitch [cm]
        #[structopt(short, long, default_value = "0.2")]
        pitch: f64,
        #[structopt(parse(from_os_str))]
        output_file: PathBuf,
    },
    /// Plot waveforms of a trigger from file
    PlotOne {
        /// Tag name
        #[structopt(short = "T", long, default_value = "gauss0")]
        tag: String,
        /// Trigger number
        #[structopt(short = "t", long, default_value = "31")]
        trigger: u32,
        /// Aspect ratio
        #[structopt(short, long, default_value = "1.0")]
        aspect: f64,
        /// Output file (.pdf or .tex), plot.pdf with the `pdf` feature and plot.tex otherwise
        #[structopt(short, long, parse(from_os_str))]
        output: Option<PathBuf>,
        #[structopt(parse(from_os_str))]
        npzfile: PathBuf,
    },
    /// Plot waveforms of all the triggers from file, one per page
    PlotMany {
        /// Aspect ratio
        #[structopt(short, long, default_value = "1.0")]
        aspect: f64,
        /// Output file (.pdf or .tex), plot.pdf with the `pdf` feature and plot.tex otherwise
        #[structopt(short, long, parse(from_os_str))]
        output: Option<PathBuf>,
        #[structopt(parse(from_os_str))]
        npzfile: PathBuf,
    },
    /// Save the frames with activity in the collection channels to a new file
    Activity {
        /// Threshold on the sum of values above minimum
        #[structopt(short, long, default_value = "5000")]
        threshold: f64,
        /// Minimum sample value to be included in sum
        #[structopt(short, long, default_value = "5")]
        minimum: f64,
        #[structopt(parse(from_os_str))]
        npzfile: PathBuf,
        #[structopt(parse(from_os_str))]
        npzout: PathBuf,
    },
    /// List the arrays in file, frames are marked with `*`
    ListFrames {
        #[structopt(parse(from_os_str))]
        npzfile: PathBuf,
    },
}

fn run(opt: Opt) -> pcbro::Result<()> {
    match opt {
        Opt::GenWires { pitch, output_file } => {
            let config = Config::default().pitch(pitch);
            wires::write_wires(&output_file, &config)?;
        }
        Opt::PlotOne {
            tag,
            trigger,
            aspect,
            output,
            npzfile,
        } => {
            let output = output.unwrap_or_else(|| PathBuf::from(report::DEFAULT_OUTPUT));
            let mut store = NpzStore::open(&npzfile)?;
            let heatmap = Heatmap::default().aspect(aspect);
            plot::plot_one(&mut store, &tag, trigger, &heatmap, &output)?;
            log::info!("{:?} written", output);
        }
        Opt::PlotMany {
            aspect,
            output,
            npzfile,
        } => {
            let output = output.unwrap_or_else(|| PathBuf::from(report::DEFAULT_OUTPUT));
            let mut store = NpzStore::open(&npzfile)?;
            let heatmap = Heatmap::default().aspect(aspect);
            let n_page = plot::plot_many(&mut store, &heatmap, &output)?;
            log::info!("{:?} written with {} pages", output, n_page);
        }
        Opt::Activity {
            threshold,
            minimum,
            npzfile,
            npzout,
        } => {
            let config = Config::default().threshold(threshold).minimum(minimum);
            let mut input = NpzStore::open(&npzfile)?;
            let mut output = NpzStore::create(&npzout);
            let kept = activity::filter(&mut input, &mut output, &config)?;
            log::info!(
                "{} of {} frames saved to {:?}",
                kept.len(),
                input.frame_keys().len(),
                npzout
            );
        }
        Opt::ListFrames { npzfile } => {
            let mut store = NpzStore::open(&npzfile)?;
            for info in store.describe()? {
                println!("{}", info);
            }
        }
    }
    Ok(())
}

/// Logger showing warnings and errors unless `env` sets a filter
fn logger(env: Env) -> env_logger::Builder {
    env_logger::Builder::from_env(env.default_filter_or("warn"))
}

fn main() -> anyhow::Result<()> {
    logger(Env::default()).init();
    let opt = Opt::from_args();
    run(opt)?;
    Ok(())
}
