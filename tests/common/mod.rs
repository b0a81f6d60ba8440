//! Shared mock transport for integration tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use uuid::Uuid;
use velotrain::ble::transport::{AdvertisingData, ServiceDef, Transport};

/// Everything the mock observed, shared with the test body.
#[derive(Debug, Default)]
pub struct MockLog {
    /// Services registered, in order.
    pub services: Vec<ServiceDef>,
    /// Advertising payloads requested.
    pub advertising: Vec<AdvertisingData>,
    /// Count of stop_advertising calls.
    pub stops: usize,
    /// Successful update_value deliveries, in order.
    pub delivered: Vec<(Uuid, Vec<u8>)>,
    /// Read responses, in order.
    pub read_responses: Vec<(Uuid, Option<Vec<u8>>)>,
    /// Write acknowledgements, in order.
    pub write_acks: Vec<(Uuid, bool)>,
}

/// Scriptable transport: `update_value` consumes queued results (defaulting
/// to success once the script is exhausted).
pub struct MockTransport {
    pub log: Rc<RefCell<MockLog>>,
    update_results: Rc<RefCell<VecDeque<bool>>>,
}

impl MockTransport {
    /// Mock plus a handle onto its observation log and result script.
    pub fn new() -> (Self, Rc<RefCell<MockLog>>, Rc<RefCell<VecDeque<bool>>>) {
        let log = Rc::new(RefCell::new(MockLog::default()));
        let results = Rc::new(RefCell::new(VecDeque::new()));
        (
            Self {
                log: log.clone(),
                update_results: results.clone(),
            },
            log,
            results,
        )
    }
}

impl Transport for MockTransport {
    fn add_service(&mut self, service: ServiceDef) {
        self.log.borrow_mut().services.push(service);
    }

    fn start_advertising(&mut self, data: AdvertisingData) {
        self.log.borrow_mut().advertising.push(data);
    }

    fn stop_advertising(&mut self) {
        self.log.borrow_mut().stops += 1;
    }

    fn update_value(&mut self, characteristic: Uuid, data: &[u8]) -> bool {
        let ok = self.update_results.borrow_mut().pop_front().unwrap_or(true);
        if ok {
            self.log
                .borrow_mut()
                .delivered
                .push((characteristic, data.to_vec()));
        }
        ok
    }

    fn respond_to_read(&mut self, characteristic: Uuid, value: Option<Vec<u8>>) {
        self.log
            .borrow_mut()
            .read_responses
            .push((characteristic, value));
    }

    fn respond_to_write(&mut self, characteristic: Uuid, ok: bool) {
        self.log.borrow_mut().write_acks.push((characteristic, ok));
    }
}

/// Queue `n` update_value failures ahead of the default successes.
pub fn fail_next_updates(results: &Rc<RefCell<VecDeque<bool>>>, n: usize) {
    let mut results = results.borrow_mut();
    for _ in 0..n {
        results.push_back(false);
    }
}
