// The `unused_crate_dependencies` lint checks every crate in a package separately.
// See <https://github.com/rust-lang/rust/issues/57274>.
#![allow(unused_crate_dependencies)]

use anyhow::Result;
use criterion::{Criterion, Throughput};
use easy_ext::ext;
use initial_sync::{Event, EventId, StateId, StateMachine};
use nonzero_ext::nonzero;
use types::phase0::primitives::{Epoch, Slot};

const LOOKAHEAD_EPOCHS: Epoch = 8;

struct FetchRequest {
    start: Slot,
    count: u64,
}

impl Event for FetchRequest {
    fn id(&self) -> EventId {
        EventId::Schedule
    }
}

fn main() {
    Criterion::default()
        .configure_from_args()
        .benchmark_trigger("StateMachine::trigger")
        .final_summary();
}

#[ext]
impl Criterion {
    fn benchmark_trigger(&mut self, group_name: &str) -> &mut Self {
        let machine = state_machine().expect("epoch states should be added");

        self.benchmark_group(group_name)
            .throughput(Throughput::Elements(1))
            .bench_function("Schedule on epoch 1", |bencher| {
                bencher.iter(|| {
                    let request = FetchRequest {
                        start: 23,
                        count: 32,
                    };

                    machine
                        .trigger(1, &request)
                        .expect("handler for Schedule should be registered in every state");
                })
            });

        self
    }
}

// Every state handles `Schedule` so that repeated triggers on the same epoch keep succeeding.
fn state_machine() -> Result<StateMachine<FetchRequest, ()>> {
    let mut machine = StateMachine::new(nonzero!(8_usize), None);

    for (state, next_state) in [
        (StateId::New, StateId::Scheduled),
        (StateId::Scheduled, StateId::DataParsed),
        (StateId::DataParsed, StateId::Sent),
        (StateId::Skipped, StateId::New),
        (StateId::Sent, StateId::New),
    ] {
        machine.add_handler(state, EventId::Schedule, move |_, request: &FetchRequest| {
            core::hint::black_box((request.start, request.count));
            Ok(next_state)
        });
    }

    for epoch in 0..LOOKAHEAD_EPOCHS {
        machine.add_epoch_state(epoch)?;
    }

    Ok(machine)
}
