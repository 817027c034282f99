//! A counter driven by a ticking effect.
//!
//! The ticker lives in the counter's `ticker` field. After three ticks the
//! counter drops the ticker and finishes, which cancels the interval.

use causeway::core::{Event, EventKind, Node};
use causeway::dispatch::ignore;
use causeway::entity::EntityType;
use causeway::io::{Cancel, IoLeaf};
use causeway::runtime::Runtime;
use causeway::state_enum;
use std::sync::Arc;
use std::time::Duration;

state_enum! {
    pub enum Phase {
        Counting,
        Done,
    }
    final: [Done]
}

fn ticker(period: Duration) -> IoLeaf {
    IoLeaf::new(move |push| {
        let ticks = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                push.push(Event::custom("Ticker.Tick"));
            }
        });
        let abort = ticks.abort_handle();
        Some(Arc::new(move || {
            println!("ticker cancelled");
            abort.abort();
        }) as Cancel)
    })
    .labeled("ticker")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let counter = EntityType::builder("Counter")
        .field("count", 0)
        .field("ticker", ticker(Duration::from_millis(50)))
        .state(Phase::Counting, |rules| {
            rules.from("ticker", |counter, _, _| {
                let count = counter.value("count").and_then(|v| v.as_i64()).unwrap_or(0) + 1;
                let counter = counter.set("count", count)?;
                if count < 3 {
                    return Ok(counter.into());
                }
                let done = counter.set("ticker", Node::Null)?.set_state(&Phase::Done)?;
                Ok((done, vec![Event::finished(count)]).into())
            })
        })
        .state(Phase::Done, |rules| rules)
        .on(EventKind::Start, ignore)
        .build()?;

    let mut runtime = Runtime::new(counter.create());
    runtime.start()?;

    while let Some(events) = runtime.next().await {
        for event in events? {
            if let Event::Finished { value } = event {
                println!("finished after {value} ticks");
                return Ok(());
            }
        }
        if let Some(count) = runtime
            .root()
            .and_then(|root| root.as_entity())
            .and_then(|counter| counter.value("count"))
        {
            println!("count = {count}");
        }
    }

    Ok(())
}
