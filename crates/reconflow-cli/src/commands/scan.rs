use super::{parse_target_id, print_json, Context};
use crate::cli::ScanArgs;
use reconflow_events::{OutputStream, ProgressEvent, ProgressKind, ProgressPayload, ScopeKey};

/// Start a scan and block until it is terminal.
///
/// The engine runs inside this process, so returning early would abandon the
/// job. Ctrl-C kills a script job instead; HTTP jobs run to completion.
pub async fn run(ctx: &Context, args: ScanArgs) -> anyhow::Result<()> {
    let target_id = parse_target_id(&args.target_id)?;
    let engine = ctx.engine();

    let mut events = engine.subscribe(ScopeKey::Target(target_id.clone()));
    let job_id = engine.start_scan(&target_id, args.scan_type).await?;
    eprintln!("job {job_id} started ({})", args.scan_type);

    let mut interrupted = false;
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let Some(progress) = event.as_progress() else { continue };
                if progress.job_id != job_id {
                    continue;
                }
                if args.follow {
                    print_progress(progress);
                }
                if progress.is_terminal() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                if engine.kill_job(&job_id) {
                    eprintln!("killing job {job_id}");
                } else {
                    eprintln!("job {job_id} cannot be killed, waiting for it to finish");
                }
            }
        }
    }
    engine.bus().unsubscribe(events);

    let job = engine.get_job_status(&job_id).await?;
    print_json(&job)
}

fn print_progress(event: &ProgressEvent) {
    match (&event.kind, &event.payload) {
        (_, ProgressPayload::Output { stream: OutputStream::Stderr, text }) => {
            eprintln!("  ! {text}");
        }
        (ProgressKind::Error, ProgressPayload::Message { text }) => eprintln!("error: {text}"),
        (_, ProgressPayload::Output { text, .. } | ProgressPayload::Message { text }) => {
            println!("  {text}");
        }
        (_, ProgressPayload::Result { .. }) => {}
    }
}
