//! Steady-state block processing must not touch the heap.  Lives in its own
//! test binary so the counting allocator sees nothing but this test.

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};

use rusttuiamp::{AudioBlock, EffectChain, ImpulseResponse, StageId};

struct Counting;

static ALLOCATIONS: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static TRACKING: Cell<bool> = const { Cell::new(false) };
}

unsafe impl GlobalAlloc for Counting {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if TRACKING.try_with(Cell::get).unwrap_or(false) {
            ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
        }
        System.alloc(layout)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout)
    }
}

#[global_allocator]
static GLOBAL: Counting = Counting;

fn count_allocations(f: impl FnOnce()) -> usize {
    ALLOCATIONS.store(0, Ordering::Relaxed);
    TRACKING.with(|t| t.set(true));
    f();
    TRACKING.with(|t| t.set(false));
    ALLOCATIONS.load(Ordering::Relaxed)
}

fn stereo(frames: usize, phase: usize) -> Vec<f32> {
    (0..frames * 2).map(|i| (((i + phase) as f32) * 0.03).sin() * 0.6).collect()
}

#[test]
fn full_chain_runs_without_allocating() {
    const FRAMES: usize = 512;
    let mut chain = EffectChain::new(44100.0, FRAMES);
    let ir = ImpulseResponse::from_samples("cab", &[0.6, 0.3, 0.1], 44100.0, 44100.0);
    chain.attach_processor(StageId::Ir, Box::new(ir));

    let inputs: Vec<Vec<f32>> = (0..8).map(|k| stereo(FRAMES, k * 7)).collect();
    let mut block = AudioBlock::with_capacity(FRAMES * 2);

    // IR alone: stereo blocks go through the mono scratch copy.
    let allocations = count_allocations(|| {
        for k in 0..100 {
            block.fill_from(&inputs[k % inputs.len()], 2);
            chain.process_in_place(&mut block);
        }
    });
    assert_eq!(allocations, 0, "IR stage allocated");

    for id in [StageId::Chorus, StageId::Drive, StageId::Delay, StageId::Reverb] {
        chain.set_enabled(id, true);
    }
    // First pass sizes the reverb's scratch sums.
    block.fill_from(&inputs[0], 2);
    chain.process_in_place(&mut block);

    let allocations = count_allocations(|| {
        for k in 0..100 {
            block.fill_from(&inputs[k % inputs.len()], 2);
            chain.process_in_place(&mut block);
        }
    });
    assert_eq!(allocations, 0, "full chain allocated");
}
