use action_flow::{LandingPolicy, SequencerPolicy};
use form_fill::FormFillPolicy;
use tool_click::ClickPolicyView;

use crate::model::PolicySnapshot;

pub fn default_snapshot() -> PolicySnapshot {
    PolicySnapshot {
        rev: 1,
        click: ClickPolicyView::default(),
        form: FormFillPolicy::default(),
        sequencer: SequencerPolicy::default(),
        landing: LandingPolicy::default(),
        provenance: Default::default(),
    }
}
