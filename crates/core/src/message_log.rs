use crate::protocol::InboundFrame;

/// Every frame received during the process lifetime, in arrival order.
///
/// The log only grows: there is no removal, and it survives across sessions.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    frames: Vec<InboundFrame>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: InboundFrame) {
        self.frames.push(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&InboundFrame> {
        self.frames.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &InboundFrame> {
        self.frames.iter()
    }

    pub fn as_slice(&self) -> &[InboundFrame] {
        &self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(kind: &str) -> InboundFrame {
        InboundFrame::from_json(&format!(r#"{{"type":"{kind}"}}"#)).unwrap()
    }

    #[test]
    fn test_push_keeps_arrival_order() {
        let mut log = MessageLog::new();
        assert!(log.is_empty());

        log.push(frame("a"));
        log.push(frame("b"));
        log.push(frame("a"));

        let kinds: Vec<&str> = log.iter().map(|f| f.kind.as_str()).collect();
        assert_eq!(kinds, vec!["a", "b", "a"]);
        assert_eq!(log.len(), 3);
        assert_eq!(log.get(1).map(|f| f.kind.as_str()), Some("b"));
        assert!(log.get(3).is_none());
    }
}
