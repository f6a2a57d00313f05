use greeter_tonic_core::proto::HelloRequest;

/// Names collected over the lifetime of one streamed-request call.
///
/// A session is created when the call opens and is owned by that call's task
/// until it completes or fails. It is never shared between calls, so it needs
/// no synchronization.
#[derive(Debug, Default)]
pub struct CallSession {
    names: Vec<String>,
}

impl CallSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the request's name. Order and duplicates are kept.
    pub fn record(&mut self, request: HelloRequest) {
        self.names.push(request.name);
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str) -> HelloRequest {
        HelloRequest {
            name: name.to_string(),
            language: "fr".to_string(),
        }
    }

    #[test]
    fn keeps_order_and_duplicates() {
        let mut session = CallSession::new();
        assert!(session.is_empty());

        for name in ["B", "A", "B", ""] {
            session.record(request(name));
        }

        assert_eq!(session.len(), 4);
        assert_eq!(session.names(), ["B", "A", "B", ""]);
    }
}
