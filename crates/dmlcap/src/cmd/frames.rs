use dmlcap_dml::Envelope;
use dmlcap_frame::{control_name, FrameKind};

use crate::cmd::{open_capture, FramesArgs};
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_frames, FrameRow, OutputFormat};

pub fn run(args: FramesArgs, format: OutputFormat) -> CliResult<i32> {
    let mut reader = open_capture(&args.input)?;
    let limit = args.limit.unwrap_or(usize::MAX);
    let mut rows = Vec::new();

    while rows.len() < limit {
        let frame = match reader.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(err) => {
                let context = format!("reading frame {}", reader.frames_read() + 1);
                // Frames listed so far are still useful for locating the damage.
                print_frames(&rows, format);
                return Err(frame_error(&context, err));
            }
        };

        if frame.control && args.data_only {
            continue;
        }

        let (service_id, order_number) = if frame.control {
            (None, None)
        } else {
            match Envelope::decode(frame.payload.clone()) {
                Ok(envelope) => (Some(envelope.service_id), Some(envelope.order_number)),
                Err(_) => (None, None),
            }
        };

        rows.push(FrameRow {
            index: reader.frames_read(),
            kind: FrameKind::of(&frame).as_str(),
            opcode: frame.opcode,
            control: frame.control.then(|| control_name(frame.opcode)),
            size: frame.payload.len(),
            service_id,
            order_number,
        });
    }

    print_frames(&rows, format);
    Ok(SUCCESS)
}
