//! Clip protocol engine
//!
//! Nested clipping through the stencil plane: each
//! `begin_clip`/`end_clip` pair routes fills and strokes into the clip
//! command stream, recording a contiguous range. At render time the
//! range stamps a fresh stencil reference value and subsequent draws
//! test against it with the rule's comparison.

use verve_core::ClipRule;

use crate::context::Context;

impl Context {
    /// Start recording clip shapes. Until [`Context::end_clip`], fill
    /// and stroke calls produce stencil geometry instead of visible
    /// draws; only solid-color variants are allowed inside.
    pub fn begin_clip(&mut self, rule: ClipRule) {
        debug_assert!(
            !self.record_clip_commands,
            "already inside a begin_clip()/end_clip() block"
        );

        self.clip_state.rule = rule;
        self.clip_state.first_cmd = self.clip_commands.len() as u32;
        self.clip_state.num_cmds = 0;

        self.record_clip_commands = true;
        self.force_new_clip_command = true;
    }

    /// Close the clip range; subsequent draws test against it.
    pub fn end_clip(&mut self) {
        debug_assert!(
            self.record_clip_commands,
            "end_clip() requires an open begin_clip()"
        );
        if !self.record_clip_commands {
            return;
        }

        self.clip_state.num_cmds = self.clip_commands.len() as u32 - self.clip_state.first_cmd;
        self.record_clip_commands = false;
        self.force_new_draw_command = true;
    }

    /// Drop the active clip region entirely.
    pub fn reset_clip(&mut self) {
        debug_assert!(
            !self.record_clip_commands,
            "reset_clip() must be called outside begin_clip()/end_clip()"
        );

        if self.clip_state.is_active() {
            self.clip_state.first_cmd = u32::MAX;
            self.clip_state.num_cmds = 0;
            self.force_new_draw_command = true;
        }
    }
}
