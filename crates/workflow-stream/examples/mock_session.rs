use std::sync::Arc;
use std::time::Duration;

use workflow_stream::prelude::*;
use workflow_stream::{DiffStats, init_observability};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_observability();

    let client = Arc::new(MockWorkflowClient::with_delay(Duration::from_millis(50)));
    let session = GenerationSession::new(client);

    let mut updates = session.generate_progress().subscribe();
    let watcher = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            println!("generate: {} item(s), streaming={}", state.count, state.is_streaming);
        }
    });

    session.initiate("Open a tab and summarize it").await;
    print_view(&session.view());

    session.initiate("Close the tab when done").await;
    print_view(&session.view());

    session.reset_all();
    watcher.abort();
}

fn print_view(view: &SessionView) {
    println!("--- {} step(s)", view.step_count);
    for line in &view.code_lines {
        println!("{:>3} | {}", line.number, line.text);
    }
    let stats = DiffStats::of(&view.diff_lines);
    println!(
        "diff: +{} -{} ={}",
        stats.added, stats.removed, stats.same
    );
    for line in view.diff_lines.iter().filter(|l| l.kind != DiffKind::Same) {
        let marker = if line.kind == DiffKind::Added { '+' } else { '-' };
        println!("{marker} {}", line.text);
    }
    if let Some(error) = view.error_generate.as_ref().or(view.error_fix.as_ref()) {
        println!("error: {error}");
    }
}
