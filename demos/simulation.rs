//! # Coherence Field Simulation
//!
//! Seven participants enter with scattered phases and mixed commitment cycles.
//! Two couple to the largest holder. The run shows the order parameter rising
//! from disorder, participants climbing the qualification ladder, a claim
//! against the reserve and an early exit paying the decoherence cost.
//!
//! ```bash
//! RUST_LOG=coherence_field=info cargo run --example simulation
//! ```

use coherence_field::{
    CoherenceEngine, Entry, FieldConfig, Fixed, HarmonicCycle, ParticipantId, ParticipationState,
};
use tracing_subscriber::EnvFilter;

// ── Display helpers ───────────────────────────────────────────────────────────

fn bar(v: Fixed) -> String {
    let filled = (v.clamp_unit().to_f64() * 20.0).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(20 - filled))
}

fn state_name(s: ParticipationState) -> &'static str {
    match s {
        ParticipationState::Attuning => "Attuning ",
        ParticipationState::Resonant => "Resonant ",
        ParticipationState::Entrained => "Entrained",
        ParticipationState::Golden => "Golden   ",
        ParticipationState::Drifting => "Drifting ",
    }
}

fn report(engine: &CoherenceEngine) {
    let f = engine.field();
    println!(
        "  epoch {:>4}  R {} {:.4}  Ψ {:.3}  D {:.3}  depth {:.3}",
        f.epoch,
        bar(f.order_parameter),
        f.order_parameter.to_f64(),
        f.global_phase.to_f64(),
        f.decentralization_coefficient.to_f64(),
        f.network_coherence_depth.to_f64(),
    );
}

fn roster(engine: &CoherenceEngine) {
    for p in engine.participants() {
        println!(
            "    #{:<2} {}  θ {:.3}  lock {:.3}  depth {:.3}  unclaimed {:>9}",
            p.id.0,
            state_name(p.state),
            p.phase.to_f64(),
            p.phase_lock(engine.field().global_phase).to_f64(),
            p.coherence_depth.to_f64(),
            p.total_unclaimed(),
        );
    }
}

// ── Main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    println!("╔══════════════════════════════════════════════════════════════════════╗");
    println!("║  Coherence Field: 600 epochs from disorder to golden coherence      ║");
    println!("╚══════════════════════════════════════════════════════════════════════╝\n");

    let mut engine = CoherenceEngine::new(FieldConfig::default(), 2_000_000_000, 200_000_000)?;

    let cycles = [
        HarmonicCycle::Golden,
        HarmonicCycle::Full,
        HarmonicCycle::Half,
        HarmonicCycle::Quarter,
        HarmonicCycle::Quarter,
        HarmonicCycle::Full,
        HarmonicCycle::Half,
    ];
    let mut ids: Vec<ParticipantId> = Vec::new();
    for (i, cycle) in cycles.iter().enumerate() {
        let amplitude = 1_000_000 + (i as u64 % 3) * 1_500_000;
        let entry = Entry::new(amplitude, amplitude, *cycle)
            .with_phase(Fixed::from_f64(0.85 * i as f64));
        ids.push(engine.enter_with(entry)?);
    }
    let whale = engine.enter(8_000_000, 8_000_000, HarmonicCycle::Golden)?;
    engine.phase_couple(ids[3], whale, Fixed::from_ratio(6, 10), 400_000)?;
    engine.phase_couple(ids[4], whale, Fixed::from_ratio(4, 10), 0)?;

    println!("▶  ENTRY: {} participants, two coupled to #{}\n", engine.field().participant_count, whale.0);
    report(&engine);
    roster(&engine);
    println!();

    // ── Synchronisation ──────────────────────────────────────────────────────
    println!("▶  EPOCHS 1–100: the field pulls together\n");
    for _ in 0..100 {
        let r = engine.step_epoch(Fixed::ONE)?;
        if r.epoch % 20 == 0 || r.transitions > 0 {
            report(&engine);
        }
    }
    println!();
    roster(&engine);
    println!();

    // ── Claims ───────────────────────────────────────────────────────────────
    println!("▶  EPOCH 100: everyone claims\n");
    for id in engine.participants().map(|p| p.id).collect::<Vec<_>>() {
        match engine.claim_emissions(id) {
            Ok(receipt) => println!(
                "    #{:<2} paid {:>9} main + {:>7} golden  (lifetime {})",
                id.0, receipt.paid.main, receipt.paid.golden, receipt.total_claimed
            ),
            Err(e) => println!("    #{:<2} refused: {e}", id.0),
        }
    }
    println!("\n  Reserve left: {}\n", engine.field().reserve_balance);

    // ── Early exit ───────────────────────────────────────────────────────────
    let leaver = ids[1];
    let quote = engine.exit_quote(leaver)?;
    println!(
        "▶  EPOCH 100: #{} leaves a Full cycle at {:.1} % progress\n",
        leaver.0,
        quote.progress.to_f64() * 100.0
    );
    let receipt = engine.decohere(leaver, true)?;
    println!(
        "    returned {}  cost {}  emissions {}  edges removed {}\n",
        receipt.returned_amplitude,
        receipt.cost,
        receipt.emissions_paid.total(),
        receipt.edges_removed
    );

    // ── Long run ─────────────────────────────────────────────────────────────
    println!("▶  EPOCHS 101–600: depth accumulates\n");
    for _ in 0..500 {
        let r = engine.step_epoch(Fixed::ONE)?;
        if r.epoch % 100 == 0 {
            report(&engine);
        }
    }
    println!();
    roster(&engine);

    let golden = engine
        .participants()
        .filter(|p| p.state == ParticipationState::Golden)
        .count();
    println!("\n╔══════════════════════════════════════════════════════════════════════╗");
    println!("║  {:>2} of {:>2} participants reached Golden                              ║", golden, engine.field().participant_count);
    println!("║  Governance weight: {:<20}                             ║", engine.total_governance_weight());
    println!("╚══════════════════════════════════════════════════════════════════════╝");
    Ok(())
}
