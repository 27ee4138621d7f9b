//! Integration Tests for Reactive System
//!
//! These tests verify that signals, computeds, effects, scopes and the counter
//! service work together correctly.

use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use tally_core::reactive::{
    batch, untracked, Computed, ComputedState, Effect, EffectOptions, Readable, Runtime, Scope,
    Signal, Subscriber,
};
use tally_core::{BoundedCounter, CounterError};

/// Every write is visible immediately and notifies, even when the value is
/// unchanged.
#[test]
fn reads_see_the_last_write_and_every_write_notifies() {
    let signal = Signal::new(0);
    let notified = Arc::new(AtomicUsize::new(0));
    let notified_clone = notified.clone();
    let subscriber = Subscriber::new(move || {
        notified_clone.fetch_add(1, Ordering::SeqCst);
    });
    signal.subscribe(&subscriber);

    for value in [3, 3, 8, 8, 1] {
        signal.set(value);
        assert_eq!(signal.get(), value);
    }
    signal.update(|v| v + 1);
    assert_eq!(signal.get(), 2);

    assert_eq!(notified.load(Ordering::SeqCst), 6);
}

/// A computed caches until a dependency changes.
#[test]
fn computed_memoizes_derived_value() {
    let compute_count = Arc::new(AtomicI32::new(0));
    let (signal, compute_clone) = (Signal::new(4), compute_count.clone());
    let signal_clone = signal.clone();

    let squared = Computed::new(move || {
        compute_clone.fetch_add(1, Ordering::SeqCst);
        signal_clone.get() * signal_clone.get()
    });

    assert_eq!(squared.get(), 16);
    assert_eq!(squared.get(), 16);
    assert_eq!(squared.get(), 16);
    assert_eq!(compute_count.load(Ordering::SeqCst), 1);

    signal.set(5);
    assert_eq!(squared.get(), 25);
    assert_eq!(compute_count.load(Ordering::SeqCst), 2);
}

/// Only the cells a computed actually read can invalidate it.
#[test]
fn computed_ignores_unrelated_signals() {
    let source = Signal::new(1);
    let unrelated = Signal::new("x".to_string());
    let source_clone = source.clone();
    let derived = Computed::new(move || source_clone.get() * 10);

    assert_eq!(derived.get(), 10);

    unrelated.set("y".to_string());
    assert_eq!(derived.state(), ComputedState::Clean);

    source.set(2);
    assert_eq!(derived.state(), ComputedState::Dirty);
    assert_eq!(derived.get(), 20);
}

/// Two dependencies changed in one batch re-run the effect once, after both.
#[test]
fn effect_waits_for_the_whole_batch() {
    let a = Signal::new(1);
    let b = Signal::new(1);
    let seen = Arc::new(Mutex::new(Vec::new()));

    let (a_clone, b_clone, seen_clone) = (a.clone(), b.clone(), seen.clone());
    let effect = Effect::new(move |_| {
        seen_clone.lock().push((a_clone.get(), b_clone.get()));
    });

    batch(|| {
        a.set(2);
        b.set(3);
    });
    assert_eq!(*seen.lock(), vec![(1, 1), (2, 3)]);

    a.set(4);
    assert_eq!(*seen.lock(), vec![(1, 1), (2, 3), (4, 3)]);
    assert_eq!(effect.run_count(), 3);

    effect.dispose();
}

/// After disposal nothing runs: no re-run and no extra cleanup.
#[test]
fn disposed_effect_stays_silent() {
    let signal = Signal::new(0);
    let runs = Arc::new(AtomicUsize::new(0));
    let cleanups = Arc::new(AtomicUsize::new(0));

    let (signal_clone, runs_clone, cleanups_clone) =
        (signal.clone(), runs.clone(), cleanups.clone());
    let effect = Effect::new(move |on_cleanup| {
        signal_clone.get();
        runs_clone.fetch_add(1, Ordering::SeqCst);
        let cleanups_clone = cleanups_clone.clone();
        on_cleanup.register(move || {
            cleanups_clone.fetch_add(1, Ordering::SeqCst);
        });
    });

    signal.set(1);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(cleanups.load(Ordering::SeqCst), 1);

    effect.dispose();
    assert_eq!(cleanups.load(Ordering::SeqCst), 2);

    signal.set(2);
    signal.set(3);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(cleanups.load(Ordering::SeqCst), 2);
    assert_eq!(signal.subscriber_count(), 0);
}

/// The ceiling check is strict, so the counter reaches ceiling + 1.
#[test]
fn bounded_counter_boundary() {
    let counter = BoundedCounter::new(10);

    for _ in 0..11 {
        counter.increment().unwrap();
    }
    assert_eq!(counter.current(), 11);

    let err = counter.increment().unwrap_err();
    assert!(matches!(
        err,
        CounterError::CeilingExceeded {
            attempted: 12,
            ceiling: 10
        }
    ));
    assert_eq!(counter.current(), 11);
}

/// A read-only view tracks the original and can drive effects.
#[test]
fn readonly_view_reflects_writes() {
    let signal = Signal::new(1);
    let view = signal.as_readonly();
    let observed = Arc::new(AtomicI32::new(0));

    let (view_clone, observed_clone) = (view.clone(), observed.clone());
    let effect = Effect::new(move |_| {
        observed_clone.store(view_clone.get(), Ordering::SeqCst);
    });

    signal.set(2);
    assert_eq!(view.get(), 2);
    assert_eq!(observed.load(Ordering::SeqCst), 2);

    signal.update(|v| v * 10);
    assert_eq!(view.get_untracked(), 20);
    assert_eq!(observed.load(Ordering::SeqCst), 20);

    effect.dispose();
}

/// Reading a cell only inside a branch under-reports the dependency.
#[test]
fn conditional_reads_are_only_tracked_when_taken() {
    let counter = Signal::new(1);
    let multiplier = Signal::new(0);

    let (counter_clone, multiplier_clone) = (counter.clone(), multiplier.clone());
    let derived = Computed::new(move || {
        if multiplier_clone.get() >= 10 {
            counter_clone.get() * 10
        } else {
            0
        }
    });

    assert_eq!(derived.get(), 0);
    counter.set(5);
    // `counter` was not read on the last run, so the cache is still valid
    assert_eq!(derived.state(), ComputedState::Clean);

    multiplier.set(10);
    assert_eq!(derived.get(), 50);

    counter.set(6);
    assert_eq!(derived.state(), ComputedState::Dirty);
    assert_eq!(derived.get(), 60);
}

/// Invalidation flows from a signal through a computed chain into an effect.
#[test]
fn invalidation_reaches_effects_through_computeds() {
    let base = Signal::new(1);
    let base_clone = base.clone();
    let doubled = Computed::new(move || base_clone.get() * 2);
    let doubled_clone = doubled.clone();
    let plus_one = Computed::new(move || doubled_clone.get() + 1);

    let observed = Arc::new(AtomicI32::new(0));
    let (plus_one_clone, observed_clone) = (plus_one.clone(), observed.clone());
    let effect = Effect::new(move |_| {
        observed_clone.store(plus_one_clone.get(), Ordering::SeqCst);
    });
    assert_eq!(observed.load(Ordering::SeqCst), 3);

    base.set(5);
    assert_eq!(observed.load(Ordering::SeqCst), 11);
    assert_eq!(effect.run_count(), 2);

    effect.dispose();
}

/// A diamond (two computeds over one signal, both read by one effect) still
/// re-runs the effect once per change.
#[test]
fn diamond_dependencies_run_effect_once() {
    let source = Signal::new(1);
    let (s1, s2) = (source.clone(), source.clone());
    let left = Computed::new(move || s1.get() + 1);
    let right = Computed::new(move || s2.get() * 2);

    let (left_clone, right_clone) = (left.clone(), right.clone());
    let effect = Effect::new(move |_| {
        left_clone.get();
        right_clone.get();
    });

    source.set(2);
    assert_eq!(effect.run_count(), 2);
    assert_eq!(left.get(), 3);
    assert_eq!(right.get(), 4);

    effect.dispose();
}

/// Reads inside `untracked` never become dependencies.
#[test]
fn untracked_reads_do_not_subscribe() {
    let tracked = Signal::new(0);
    let ignored = Signal::new(0);

    let (tracked_clone, ignored_clone) = (tracked.clone(), ignored.clone());
    let effect = Effect::new(move |_| {
        tracked_clone.get();
        untracked(|| ignored_clone.get());
    });

    ignored.set(1);
    assert_eq!(effect.run_count(), 1);

    tracked.set(1);
    assert_eq!(effect.run_count(), 2);
    assert_eq!(effect.dependency_count(), 1);

    effect.dispose();
}

/// Any readable cell can be handed to generic host code.
#[test]
fn readable_is_shared_by_all_cells() {
    fn render(cell: &impl Readable<i32>) -> String {
        format!("value: {}", cell.get())
    }

    let signal = Signal::new(3);
    let signal_clone = signal.clone();
    let computed = Computed::new(move || signal_clone.get() + 1);

    assert_eq!(render(&signal), "value: 3");
    assert_eq!(render(&signal.as_readonly()), "value: 3");
    assert_eq!(render(&computed), "value: 4");
}

/// The component flow: a shared counter service, a derived value, and a
/// logging effect owned by the component's scope.
#[test]
fn component_flow_with_shared_counter() {
    let service = BoundedCounter::new(10);
    let log = Arc::new(Mutex::new(Vec::new()));
    let component = Scope::new();

    let counter = service.clone();
    let derived_counter = Computed::new(move || counter.current() * 10);

    let (counter, derived, log_clone) = (service.clone(), derived_counter.clone(), log.clone());
    let effect = component.effect(move |_| {
        log_clone.lock().push(format!(
            "counter: {} derived counter: {}",
            counter.current(),
            derived.get()
        ));
    });

    // Another component holding the same service instance
    let other = service.clone();
    service.increment().unwrap();
    other.increment().unwrap();

    assert_eq!(
        *log.lock(),
        vec![
            "counter: 0 derived counter: 0",
            "counter: 1 derived counter: 10",
            "counter: 2 derived counter: 20",
        ]
    );

    drop(component);
    assert!(effect.is_disposed());

    service.increment().unwrap();
    assert_eq!(log.lock().len(), 3);
    assert_eq!(derived_counter.get(), 30);
}

/// A manual-cleanup effect survives its component and is stopped on demand.
#[test]
fn manual_cleanup_effect_survives_component() {
    let signal = Signal::new(0);
    let cleaned_up = Arc::new(AtomicUsize::new(0));
    let component = Scope::new();
    let live_before = Runtime::live_effects();

    let (signal_clone, cleaned_clone) = (signal.clone(), cleaned_up.clone());
    let effect = component.effect_with_options(
        move |on_cleanup| {
            signal_clone.get();
            let cleaned_clone = cleaned_clone.clone();
            on_cleanup.register(move || {
                cleaned_clone.fetch_add(1, Ordering::SeqCst);
            });
        },
        EffectOptions::new().manual_cleanup(true),
    );
    assert_eq!(Runtime::live_effects(), live_before + 1);

    component.dispose();
    signal.set(1);
    assert_eq!(effect.run_count(), 2);

    effect.dispose();
    assert_eq!(cleaned_up.load(Ordering::SeqCst), 2);
    assert_eq!(Runtime::live_effects(), live_before);
}
