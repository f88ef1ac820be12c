pub mod batch;
pub mod error;
pub mod ffmpeg;
pub mod fstools;
pub mod quality;
pub mod registry;
pub mod task;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use rustop::opts;
use signal_hook::consts::SIGINT;

use batch::BatchProcessor;
use quality::QualityConfig;

fn main() -> ExitCode {
    env_logger::init();

    let (args, _rest) = opts! {
        synopsis "Extract audio from video files and convert it to mp3. Supports batch conversion, concurrent workers, and progress display.";
        opt output:Option<String>, desc:"Output directory (default: alongside the input)";
        opt threads:usize=4, desc:"Number of concurrent conversions";
        opt quality:String=String::from("vbr"), desc:"Quality mode. [vbr, cbr]";
        opt level:String=String::from("high"), desc:"Quality level. [high, mid, low]";
        param input:String, desc:"Input video file or directory";
    }.parse_or_exit();

    // reject an invalid mode/level before building any task
    let quality = match QualityConfig::from_args(&args.quality, &args.level) {
        Ok(quality) => quality,
        Err(err) => {
            println!("{}", err);
            return ExitCode::FAILURE;
        },
    };

    let f = ffmpeg::FFmpeg::new();
    if !f.is_installed() {
        println!("ffmpeg is not installed.");
        return ExitCode::FAILURE;
    }

    let cancel = Arc::new(AtomicBool::new(false));
    if let Err(err) = signal_hook::flag::register(SIGINT, Arc::clone(&cancel)) {
        println!("Unable to install interrupt handler: {}", err);
        return ExitCode::FAILURE;
    }

    let processor = BatchProcessor::new(quality, args.threads.max(1), cancel);
    let output_dir = args.output.map(PathBuf::from);
    match processor.run(&PathBuf::from(&args.input), output_dir.as_deref()) {
        Ok(report) => {
            println!("{}", report);
            if report.interrupted {
                println!("Interrupted; partial outputs removed.");
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        },
        Err(err) => {
            println!("{}", err);
            ExitCode::FAILURE
        },
    }
}
