use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::sync::Arc;

use dmlcap_dml::{Router, RouterConfig};
use dmlcap_pipeline::{CancellationToken, Mode, PipelineConfig};

use crate::cmd::{load_catalog, open_capture, DecodeArgs};
use crate::exit::{dml_error, io_error, pipeline_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::JsonSink;

pub fn run(args: DecodeArgs) -> CliResult<i32> {
    let reader = open_capture(&args.input)?;
    let catalog = load_catalog(&args.services)?;
    let table = catalog
        .build_table()
        .map_err(|err| dml_error("building dispatch table", err))?;

    let out: Box<dyn Write + Send> = match &args.output {
        Some(path) => {
            let file = File::create(path)
                .map_err(|err| io_error(&format!("cannot create {}", path.display()), err))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(io::stdout())),
    };

    let mut router = Router::with_config(
        Arc::new(table),
        RouterConfig {
            on_unknown: args.on_unknown.into(),
            on_malformed: args.on_malformed.into(),
        },
    );
    router.register_middleware(JsonSink::new(out, args.compact));

    let config = PipelineConfig {
        mode: if args.pipelined {
            Mode::Pipelined
        } else {
            Mode::Sequential
        },
        queue_capacity: args.queue_capacity,
        on_read_error: args.on_read_error.into(),
    };

    let cancel = CancellationToken::new();
    install_ctrlc_handler(cancel.clone())?;

    tracing::debug!(input = %args.input.display(), mode = ?config.mode, "decoding capture");
    let result = dmlcap_pipeline::run(reader, &mut router, &config, &cancel);

    // Flush whatever was decoded, even when the run failed part way.
    let finished = router.finish();
    let stats = result.map_err(|err| pipeline_error("decode failed", err))?;
    finished.map_err(|err| dml_error("writing output", err))?;

    tracing::info!(
        frames = stats.frames,
        control_frames = stats.control_frames,
        skipped_unknown = stats.skipped_unknown,
        skipped_malformed = stats.skipped_malformed,
        "{stats}"
    );
    Ok(SUCCESS)
}

fn install_ctrlc_handler(cancel: CancellationToken) -> CliResult<()> {
    ctrlc::set_handler(move || cancel.cancel()).map_err(|err| {
        CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
    })
}
