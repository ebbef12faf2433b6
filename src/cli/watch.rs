//! Watch and serve command implementations

use std::process::ExitCode;

use super::{EXIT_ERROR, EXIT_SUCCESS};
use crate::build::{BuildContext, IncrementalSession, Pipeline};
use crate::watch::{watch_and_rebuild, WatchOptions};

/// Build once, then keep the session alive for incremental rebuilds.
fn start_session(ctx: BuildContext) -> Result<(IncrementalSession, WatchOptions), ExitCode> {
    let options = WatchOptions::from_context(&ctx);
    let pipeline = Pipeline::new(ctx).map_err(|e| {
        eprintln!("Error: {}", e);
        ExitCode::from(EXIT_ERROR)
    })?;

    match IncrementalSession::start(pipeline) {
        Ok((session, report)) => {
            println!("{}", report.summary());
            Ok((session, options))
        }
        Err(e) => {
            eprintln!("Build failed: {}", e);
            Err(ExitCode::from(EXIT_ERROR))
        }
    }
}

/// Run the watch command
pub fn run_watch(ctx: BuildContext) -> ExitCode {
    let (session, options) = match start_session(ctx) {
        Ok(started) => started,
        Err(code) => return code,
    };

    println!("Starting watch mode...");
    println!("Press Ctrl+C to stop");
    println!();

    match watch_and_rebuild(session, options, |report| println!("{}", report.summary())) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("Watch error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Run the serve command: build, watch on a background thread, serve in the
/// foreground. Every successful rebuild bumps the reload generation.
#[cfg(feature = "serve")]
pub fn run_serve(ctx: BuildContext, watch: bool) -> ExitCode {
    use crate::serve::DevServer;
    use std::sync::atomic::Ordering;

    let server = DevServer::new(ctx.out_dir(), ctx.config().serve.clone());
    let (session, options) = match start_session(ctx) {
        Ok(started) => started,
        Err(code) => return code,
    };

    if watch {
        let generation = server.generation();
        std::thread::spawn(move || {
            let result = watch_and_rebuild(session, options, |report| {
                println!("{}", report.summary());
                generation.fetch_add(1, Ordering::SeqCst);
            });
            if let Err(e) = result {
                tracing::error!("Watch error: {}", e);
            }
        });
    }

    println!("Serving at http://{}", server.address());
    println!("Press Ctrl+C to stop");
    match server.run() {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("Serve error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
