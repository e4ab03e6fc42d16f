use crate::directory::ChannelDirectory;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActiveTarget {
    #[default]
    NoActiveTarget,
    HasActiveTarget(String),
}

/// Owns the choice of which single target is on screen.
#[derive(Debug, Default)]
pub struct ActiveSessionController {
    state: ActiveTarget,
}

impl ActiveSessionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ActiveTarget {
        &self.state
    }

    pub fn active_id(&self) -> Option<&str> {
        match &self.state {
            ActiveTarget::HasActiveTarget(id) => Some(id),
            ActiveTarget::NoActiveTarget => None,
        }
    }

    /// First created target wins; later creations leave the selection alone.
    pub fn on_target_created(&mut self, id: &str) -> bool {
        if self.state == ActiveTarget::NoActiveTarget {
            self.state = ActiveTarget::HasActiveTarget(id.to_string());
            return true;
        }
        false
    }

    /// Explicit switches always win, but only onto targets that exist.
    pub fn on_switch_requested(&mut self, id: &str, directory: &ChannelDirectory) -> bool {
        if !directory.contains(id) {
            tracing::debug!(target_id = id, "switch to unknown target ignored");
            return false;
        }
        if self.active_id() == Some(id) {
            return false;
        }
        self.state = ActiveTarget::HasActiveTarget(id.to_string());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TargetKind;

    fn directory(ids: &[&str]) -> ChannelDirectory {
        let mut dir = ChannelDirectory::new();
        for id in ids {
            dir.upsert(*id, TargetKind::Public, *id);
        }
        dir
    }

    #[test]
    fn first_created_target_becomes_active() {
        let mut ctl = ActiveSessionController::new();
        assert_eq!(ctl.state(), &ActiveTarget::NoActiveTarget);
        assert!(ctl.on_target_created("general"));
        assert!(!ctl.on_target_created("random"));
        assert_eq!(ctl.active_id(), Some("general"));
    }

    #[test]
    fn explicit_switch_overrides_default() {
        let dir = directory(&["general", "random"]);
        let mut ctl = ActiveSessionController::new();
        ctl.on_target_created("general");
        ctl.on_target_created("random");
        assert!(ctl.on_switch_requested("random", &dir));
        assert_eq!(
            ctl.state(),
            &ActiveTarget::HasActiveTarget("random".to_string())
        );
    }

    #[test]
    fn switch_to_unknown_target_is_ignored() {
        let dir = directory(&["general"]);
        let mut ctl = ActiveSessionController::new();
        assert!(!ctl.on_switch_requested("nowhere", &dir));
        assert_eq!(ctl.state(), &ActiveTarget::NoActiveTarget);
        assert!(ctl.on_switch_requested("general", &dir));
        assert!(!ctl.on_switch_requested("general", &dir));
        assert_eq!(ctl.active_id(), Some("general"));
    }
}
