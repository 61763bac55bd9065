use code_replay::{
    ChangeSet, CodeReplay, HeadlessEditor, HeadlessView, OffsetRange, Operation, Position,
    ReplayConfig, StructuredAction, StructuredReplay, TextChange, Trace,
};
use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SEED: u64 = 0x5eed;

/// A session typing `count` short snippets at random places, one every 40 ms.
fn typing_trace(count: usize) -> Trace<Operation> {
    let mut rng = StdRng::seed_from_u64(SEED);
    let mut lines = vec![0usize];
    let mut pairs = Vec::with_capacity(count * 2);

    for _ in 0..count {
        let line = rng.gen_range(0..lines.len());
        let ch = rng.gen_range(0..=lines[line]);
        let at = Position::new(line, ch);

        let (inserted, caret) = if rng.gen_bool(0.1) {
            let rest = lines[line] - ch;
            lines[line] = ch;
            lines.insert(line + 1, rest);
            (vec![String::new(), String::new()], Position::new(line + 1, 0))
        } else {
            let word = "token_";
            lines[line] += word.len();
            (vec![word.to_string()], Position::new(line, ch + word.len()))
        };

        pairs.push((
            40.0,
            Operation::Text(TextChange::new(at, at, inserted, vec![String::new()])),
        ));
        pairs.push((0.0, Operation::Cursor(caret)));
    }

    Trace::new(pairs).unwrap()
}

/// The structured equivalent: `count` inserts at random offsets.
fn change_trace(count: usize) -> Trace<StructuredAction> {
    let mut rng = StdRng::seed_from_u64(SEED);
    let mut len = 0usize;
    let mut pairs = Vec::with_capacity(count);

    for _ in 0..count {
        let at = rng.gen_range(0..=len);
        let changes = ChangeSet::insert(len, at, "token_\n").unwrap();
        len = changes.new_len();
        let caret = at + 7;
        pairs.push((
            40.0,
            StructuredAction::Change {
                changes,
                selection: Some(OffsetRange::new(caret, caret)),
            },
        ));
    }

    Trace::new(pairs).unwrap()
}

fn bench_plain_seek(c: &mut Criterion) {
    let trace = typing_trace(5_000);
    let end = trace.duration().unwrap_or(0.0);

    c.bench_function("plain_seek/5k_ops_to_end", |b| {
        b.iter_batched(
            || {
                let mut replay =
                    CodeReplay::new(trace.clone(), ReplayConfig::default(), &()).unwrap();
                replay.mount(HeadlessEditor::default());
                replay
            },
            |mut replay| {
                replay.on_time_update(black_box(end));
                black_box(replay.index());
            },
            BatchSize::LargeInput,
        )
    });

    c.bench_function("plain_seek/5k_ops_end_and_back", |b| {
        b.iter_batched(
            || {
                let mut replay =
                    CodeReplay::new(trace.clone(), ReplayConfig::default(), &()).unwrap();
                replay.mount(HeadlessEditor::default());
                replay
            },
            |mut replay| {
                replay.on_time_update(black_box(end));
                replay.on_time_update(black_box(0.0));
                black_box(replay.index());
            },
            BatchSize::LargeInput,
        )
    });
}

fn bench_structured_seek(c: &mut Criterion) {
    let trace = change_trace(2_000);
    let end = trace.duration().unwrap_or(0.0);

    c.bench_function("structured_seek/2k_changes_end_and_back", |b| {
        b.iter_batched(
            || {
                StructuredReplay::new(
                    trace.clone(),
                    HeadlessView::new(""),
                    ReplayConfig::default(),
                    &(),
                )
                .unwrap()
            },
            |mut replay| {
                replay.on_time_update(black_box(end));
                replay.on_time_update(black_box(0.0));
                black_box(replay.index());
            },
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, bench_plain_seek, bench_structured_seek);
criterion_main!(benches);
