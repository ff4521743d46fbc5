use crate::gate::{EdgeDetector, TriggerEdge};
use crate::modes::PlayMode;
use crate::pitch::NoteNumber;
use crate::voice::Voice;

/// The note event manager is represented here
///
/// Notes are started by rising edges on either the gate input or the tap button. Each trigger either starts a fresh
/// note, cutting off whatever was sounding, or slides into the new note legato.
pub struct NoteEventManager {
    velocity: u8,
    // the gate level from the previous tick, for edge detection
    gate: EdgeDetector,
}

impl NoteEventManager {
    /// `NoteEventManager::new(v)` is a new note event manager which plays every note at velocity `v`
    pub fn new(velocity: u8) -> Self {
        Self {
            velocity,
            gate: EdgeDetector::new(),
        }
    }

    /// `nm.track_gate(g)` records gate level `g` for this tick without triggering anything
    ///
    /// Used while notes are not being played so that a gate which is already high when play resumes does not count
    /// as a new rising edge.
    pub fn track_gate(&mut self, gate: bool) {
        self.gate.update(gate);
    }

    /// `nm.process_cycle(g, t, s, m, n, v)` runs the trigger logic for one control tick and is the number of triggers
    ///
    /// The gate and tap button are independent trigger sources, each fires at most once per tick and both may fire in
    /// the same tick. Must be called exactly once per control tick.
    ///
    /// # Arguments
    ///
    /// * `gate` - the current level of the gate input
    ///
    /// * `tap` - the debounced tap button edges for this tick
    ///
    /// * `slide` - slide into the note instead of restarting it
    ///
    /// * `mode` - the current play mode
    ///
    /// * `note` - the note to play if triggered
    ///
    /// * `voice` - the voice to play on
    pub fn process_cycle<V: Voice>(
        &mut self,
        gate: bool,
        tap: TriggerEdge,
        slide: bool,
        mode: PlayMode,
        note: NoteNumber,
        voice: &mut V,
    ) -> u8 {
        let gate = TriggerEdge::from(self.gate.update(gate));

        let mut triggers = 0;
        for source in [gate, tap].iter() {
            if source.rising {
                self.on_trigger(slide, mode, note, voice);
                triggers += 1;
            }
        }
        triggers
    }

    /// `nm.on_trigger(s, m, n, v)` plays note `n` on voice `v`, sliding into it iff `s` is true
    ///
    /// A fresh note silences everything that is sounding first. A slide keeps the current note list, trimmed to keep
    /// it bounded. In the soft play mode a slide also restarts the envelopes so the new note gets an audible attack.
    pub fn on_trigger<V: Voice>(
        &self,
        slide: bool,
        mode: PlayMode,
        note: NoteNumber,
        voice: &mut V,
    ) {
        if slide {
            voice.trim_note_list();
            if mode.is_soft() {
                voice.retrigger_main_env();
                voice.reset_amp_env();
            }
        } else {
            voice.all_notes_off();
        }
        voice.note_on(note, self.velocity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::mock::{Call, RecordingVoice};

    const NO_EDGE: TriggerEdge = TriggerEdge {
        rising: false,
        falling: false,
    };
    const TAP: TriggerEdge = TriggerEdge {
        rising: true,
        falling: false,
    };
    const C3: NoteNumber = NoteNumber::new(48);

    #[test]
    fn fresh_note_silences_then_plays() {
        let nm = NoteEventManager::new(150);
        let mut v = RecordingVoice::default();
        nm.on_trigger(false, PlayMode::Normal, C3, &mut v);
        assert_eq!(&v.calls[..], &[Call::AllNotesOff, Call::NoteOn(48, 150)]);
    }

    #[test]
    fn fresh_note_is_the_same_in_every_mode() {
        for mode in [PlayMode::Babyfish, PlayMode::Normal, PlayMode::Devilfish].iter() {
            let nm = NoteEventManager::new(150);
            let mut v = RecordingVoice::default();
            nm.on_trigger(false, *mode, C3, &mut v);
            assert_eq!(&v.calls[..], &[Call::AllNotesOff, Call::NoteOn(48, 150)]);
        }
    }

    #[test]
    fn soft_slide_retriggers_envelopes_before_note() {
        let nm = NoteEventManager::new(150);
        let mut v = RecordingVoice::default();
        nm.on_trigger(true, PlayMode::Babyfish, C3, &mut v);
        assert_eq!(
            &v.calls[..],
            &[
                Call::TrimNoteList,
                Call::RetriggerMainEnv,
                Call::ResetAmpEnv,
                Call::NoteOn(48, 150)
            ]
        );
    }

    #[test]
    fn hard_slide_is_legato() {
        for mode in [PlayMode::Normal, PlayMode::Devilfish].iter() {
            let nm = NoteEventManager::new(150);
            let mut v = RecordingVoice::default();
            nm.on_trigger(true, *mode, C3, &mut v);
            assert_eq!(&v.calls[..], &[Call::TrimNoteList, Call::NoteOn(48, 150)]);
        }
    }

    #[test]
    fn gate_rising_edge_triggers_once_while_held() {
        let mut nm = NoteEventManager::new(150);
        let mut v = RecordingVoice::default();
        let mut triggers = 0;
        for _ in 0..10 {
            triggers += nm.process_cycle(true, NO_EDGE, false, PlayMode::Normal, C3, &mut v);
        }
        assert_eq!(triggers, 1);

        // falling edge does nothing, next rising edge triggers again
        assert_eq!(nm.process_cycle(false, NO_EDGE, false, PlayMode::Normal, C3, &mut v), 0);
        assert_eq!(nm.process_cycle(true, NO_EDGE, false, PlayMode::Normal, C3, &mut v), 1);
        assert_eq!(v.calls.len(), 4);
    }

    #[test]
    fn tap_and_gate_trigger_independently() {
        let mut nm = NoteEventManager::new(150);
        let mut v = RecordingVoice::default();
        assert_eq!(nm.process_cycle(false, TAP, false, PlayMode::Normal, C3, &mut v), 1);
        assert_eq!(nm.process_cycle(true, TAP, false, PlayMode::Normal, C3, &mut v), 2);
        assert_eq!(nm.process_cycle(true, NO_EDGE, false, PlayMode::Normal, C3, &mut v), 0);
    }

    #[test]
    fn tracked_gate_does_not_trigger_on_resume() {
        let mut nm = NoteEventManager::new(150);
        let mut v = RecordingVoice::default();
        nm.track_gate(true);
        assert_eq!(nm.process_cycle(true, NO_EDGE, false, PlayMode::Normal, C3, &mut v), 0);
        assert!(v.calls.is_empty());
    }
}
