//! Segment scheduling and transcript instructions

use crate::station::{SegmentKind, SegmentSpec, VoiceMap};

/// Kinds cycled through after the cold open
const ROTATION: [SegmentKind; 4] = [
    SegmentKind::Topic,
    SegmentKind::Banter,
    SegmentKind::Topic,
    SegmentKind::Ad,
];

/// Decides what each segment of a broadcast is about
#[derive(Debug, Clone)]
pub struct SegmentPlan {
    topic: String,
}

impl SegmentPlan {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
        }
    }

    pub fn kind_at(&self, index: u64) -> SegmentKind {
        if index == 0 {
            SegmentKind::ColdOpen
        } else {
            ROTATION[((index - 1) % ROTATION.len() as u64) as usize]
        }
    }

    pub fn spec(&self, index: u64) -> SegmentSpec {
        SegmentSpec::new(index, self.kind_at(index), self.topic.clone())
    }
}

fn kind_instruction(kind: SegmentKind) -> &'static str {
    match kind {
        SegmentKind::ColdOpen => {
            "This is the cold open: the hosts welcome listeners and tease what the show is about."
        }
        SegmentKind::Topic => "In this segment the hosts dig into one specific aspect of the description.",
        SegmentKind::Banter => {
            "This segment is light-hearted banter between the hosts, loosely related to the description."
        }
        SegmentKind::Ad => {
            "This segment is a short, playful advertisement for a fictional product related to the description."
        }
        SegmentKind::Outro => "This is the outro: the hosts wrap up the show and thank listeners.",
    }
}

/// Join host names as "A", "A and B", "A, B and C"
fn join_hosts(voices: &VoiceMap) -> String {
    let names: Vec<&str> = voices.speakers().collect();
    match names.as_slice() {
        [] => String::new(),
        [one] => one.to_string(),
        [rest @ .., last] => format!("{} and {}", rest.join(", "), last),
    }
}

/// Natural-language instruction for the transcript model
pub fn transcript_prompt(spec: &SegmentSpec, voices: &VoiceMap) -> String {
    format!(
        "Generate a short transcript around {words} words for a podcast based on this description:\n\n\
         {topic}\n\n\
         {instruction}\n\
         The hosts names are {hosts}. Write every line as `Name: text` using only the hosts' names, \
         with no stage directions or sound effects.",
        words = spec.target_words,
        topic = spec.topic,
        instruction = kind_instruction(spec.kind),
        hosts = join_hosts(voices),
    )
}
