//! Two tasks run one after the other.
//!
//! The pipeline fetches a payload, then measures it. Each step is a task in
//! the `step` field; replacing the field is all it takes to move on.

use causeway::core::{Event, EventKind, Node};
use causeway::dispatch::ignore;
use causeway::entity::EntityType;
use causeway::runtime::Runtime;
use causeway::state_enum;
use causeway::task::{Task, TaskEvent};
use std::time::Duration;

state_enum! {
    pub enum Stage {
        Fetching,
        Measuring,
        Done,
    }
    final: [Done]
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let fetch = Task::from_async(|url: String| async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok::<_, String>(format!("payload from {url}"))
    });
    let measure = Task::from_async(|text: String| async move {
        if text.is_empty() {
            return Err("nothing to measure".to_string());
        }
        Ok(text.len())
    });

    let pipeline = EntityType::builder("Pipeline")
        .field("step", Node::Null)
        .state(Stage::Fetching, move |rules| {
            rules.on_from(EventKind::TaskSuccess, "step", move |pipeline, event, _| {
                let Event::Task(TaskEvent::Success { value }) = event else {
                    return Ok(pipeline.clone().into());
                };
                let text = value.as_str().unwrap_or_default().to_string();
                println!("fetched {text:?}");
                let next = pipeline
                    .set("step", measure.call(text))?
                    .set_state(&Stage::Measuring)?;
                Ok(next.into())
            })
        })
        .state(Stage::Measuring, |rules| {
            rules.on_from(EventKind::TaskSuccess, "step", |pipeline, event, _| {
                let Event::Task(TaskEvent::Success { value }) = event else {
                    return Ok(pipeline.clone().into());
                };
                let done = pipeline.set("step", Node::Null)?.set_state(&Stage::Done)?;
                Ok((done, vec![Event::finished(value.clone())]).into())
            })
        })
        .state(Stage::Done, |rules| rules)
        .on_from(EventKind::TaskFailure, "step", |pipeline, event, _| {
            let error = match event {
                Event::Task(TaskEvent::Failure { error }) => error.clone(),
                _ => serde_json::Value::Null,
            };
            Ok((pipeline.set("step", Node::Null)?, vec![Event::finished(error)]).into())
        })
        .on(EventKind::Start, ignore)
        .from("step", ignore)
        .build()?;

    let root = pipeline
        .create()
        .set("step", fetch.call("https://example.com/data".to_string()))?;
    let mut runtime = Runtime::new(root);
    runtime.start()?;

    while let Some(events) = runtime.next().await {
        for event in events? {
            if let Event::Finished { value } = event {
                println!("pipeline finished with {value}");
                return Ok(());
            }
        }
    }

    Ok(())
}
