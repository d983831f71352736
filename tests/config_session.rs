use bluer::Address;
use eddystone_config::constants::SERVICE_UUID;
use eddystone_config::characteristic::ConfigCharacteristic;
use eddystone_config::lock::{Block, LockKey};
use eddystone_config::transport::{ClientId, GattHandler, Peripheral};
use eddystone_config::{AppError, BeaconConfiguration, ConfigGattService, GattStatus, LockState, Result, ServiceState};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Call {
    Serve,
    Advertise(Uuid),
    StopAdvertising,
    Disconnect(Address),
    Release,
}

/// Holds the next `disconnect` until the test lets it go.
struct Gate {
    reached: mpsc::Sender<()>,
    resume: mpsc::Receiver<()>,
}

#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<Call>>,
    handler: Mutex<Option<Arc<dyn GattHandler>>>,
    fail_advertise: AtomicBool,
    gate: Mutex<Option<Gate>>,
}

#[derive(Clone, Default)]
struct MockPeripheral(Arc<Recorder>);

impl MockPeripheral {
    fn record(&self, call: Call) {
        self.0.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<Call> {
        self.0.calls.lock().unwrap().clone()
    }

    fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    fn pause_next_disconnect(&self) -> (mpsc::Receiver<()>, mpsc::Sender<()>) {
        let (reached_tx, reached_rx) = mpsc::channel();
        let (resume_tx, resume_rx) = mpsc::channel();
        *self.0.gate.lock().unwrap() = Some(Gate {
            reached: reached_tx,
            resume: resume_rx,
        });
        (reached_rx, resume_tx)
    }

    fn handler(&self) -> Arc<dyn GattHandler> {
        self.0.handler.lock().unwrap().clone().expect("service not served")
    }
}

impl Peripheral for MockPeripheral {
    fn serve(&self, handler: Arc<dyn GattHandler>) -> BoxFuture<'_, Result<()>> {
        self.record(Call::Serve);
        *self.0.handler.lock().unwrap() = Some(handler);
        async { Ok(()) }.boxed()
    }

    fn advertise(&self, service: Uuid) -> BoxFuture<'_, Result<()>> {
        self.record(Call::Advertise(service));
        let fail = self.0.fail_advertise.load(Ordering::SeqCst);
        async move {
            if fail {
                Err(AppError::PeripheralUnavailable("no advertising instances".to_string()))
            } else {
                Ok(())
            }
        }
        .boxed()
    }

    fn stop_advertising(&self) {
        self.record(Call::StopAdvertising);
    }

    fn disconnect(&self, client: ClientId) {
        self.record(Call::Disconnect(client));
        let gate = self.0.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.reached.send(()).unwrap();
            gate.resume.recv().unwrap();
        }
    }

    fn release(&self) {
        self.record(Call::Release);
    }
}

type Results = Arc<Mutex<Vec<Option<BeaconConfiguration>>>>;

fn service_with(seed: Option<BeaconConfiguration>) -> (ConfigGattService, MockPeripheral, Results) {
    let peripheral = MockPeripheral::default();
    let results: Results = Arc::default();
    let sink = results.clone();
    let listener = move |configured| sink.lock().unwrap().push(configured);
    let service = match seed {
        Some(seed) => ConfigGattService::with_configuration(peripheral.clone(), listener, seed),
        None => ConfigGattService::new(peripheral.clone(), listener),
    };
    (service, peripheral, results)
}

fn phone() -> Address {
    Address::new([0xc0, 0xff, 0xee, 0x00, 0x00, 0x01])
}

fn other_phone() -> Address {
    Address::new([0xc0, 0xff, 0xee, 0x00, 0x00, 0x02])
}

fn locked_seed(key: &LockKey) -> BeaconConfiguration {
    let mut seed = BeaconConfiguration::new("https://example.com", key.clone());
    seed.lock_state = LockState::Locked;
    seed
}

fn unlock(handler: &Arc<dyn GattHandler>, key: &LockKey) -> std::result::Result<(), GattStatus> {
    let challenge: Block = handler
        .on_read(phone(), ConfigCharacteristic::Unlock)
        .unwrap()
        .try_into()
        .unwrap();
    handler.on_write(phone(), ConfigCharacteristic::Unlock, &key.respond(&challenge))
}

#[tokio::test]
async fn reconfigures_url_and_reports_last_values_once() {
    let (service, peripheral, results) = service_with(None);
    service.start("https://example.com").await.unwrap();
    assert_eq!(service.state(), ServiceState::Advertising);
    assert!(peripheral.calls().contains(&Call::Advertise(*SERVICE_UUID)));

    let handler = peripheral.handler();
    handler.on_connect(phone());
    assert_eq!(handler.on_read(phone(), ConfigCharacteristic::LockState), Ok(vec![0x01]));
    assert_eq!(handler.on_read(phone(), ConfigCharacteristic::UriData), Ok(b"\x03example\x07".to_vec()));
    handler.on_write(phone(), ConfigCharacteristic::UriData, b"\x03example\x08").unwrap();
    handler.on_write(phone(), ConfigCharacteristic::BeaconPeriod, &[0xf4, 0x01]).unwrap();
    handler.on_write(phone(), ConfigCharacteristic::BeaconPeriod, &[0xee, 0x02]).unwrap();
    assert_eq!(service.state(), ServiceState::Authenticated);

    handler.on_disconnect(phone());
    handler.on_disconnect(phone());

    let results = results.lock().unwrap();
    assert_eq!(results.len(), 1);
    let configured = results[0].as_ref().unwrap();
    assert_eq!(configured.advertised_url, "https://example.org");
    assert_eq!(configured.beacon_period, 750);
    assert_eq!(configured.lock_state, LockState::Unlocked);
    assert_eq!(service.state(), ServiceState::Idle);
    assert_eq!(peripheral.count(&Call::Release), 1);
}

#[tokio::test]
async fn three_failed_unlocks_end_the_session_empty() {
    let key = LockKey::generate();
    let wrong = LockKey::generate();
    let (service, peripheral, results) = service_with(Some(locked_seed(&key)));
    service.start("https://example.com").await.unwrap();

    let handler = peripheral.handler();
    handler.on_connect(phone());
    assert_eq!(handler.on_read(phone(), ConfigCharacteristic::LockState), Ok(vec![0x00]));
    assert_eq!(
        handler.on_write(phone(), ConfigCharacteristic::UriData, b"\x03example\x08"),
        Err(GattStatus::InsufficientAuthorization)
    );
    assert_eq!(service.state(), ServiceState::Authenticating);

    for _ in 0..3 {
        assert_eq!(unlock(&handler, &wrong), Err(GattStatus::InsufficientAuthorization));
    }

    assert_eq!(*results.lock().unwrap(), vec![None]);
    assert!(peripheral.calls().contains(&Call::Disconnect(phone())));
    assert_eq!(service.state(), ServiceState::Idle);

    let kept = service.configuration().unwrap();
    assert_eq!(kept.advertised_url, "https://example.com");
    assert_eq!(kept.lock_state, LockState::Locked);
    assert_eq!(kept.lock_key, key);
}

#[tokio::test]
async fn close_before_any_client_never_notifies() {
    let (service, peripheral, results) = service_with(None);
    service.start("https://example.com").await.unwrap();
    service.close();

    assert!(results.lock().unwrap().is_empty());
    assert_eq!(service.state(), ServiceState::Idle);
    assert_eq!(peripheral.count(&Call::Release), 1);

    // Late events from the stack are ignored.
    peripheral.handler().on_connect(phone());
    assert_eq!(service.state(), ServiceState::Idle);
}

#[tokio::test]
async fn close_is_idempotent_including_drop() {
    let (service, peripheral, results) = service_with(None);
    service.start("https://example.com").await.unwrap();
    peripheral.handler().on_connect(phone());

    service.close();
    service.close();
    drop(service);

    assert_eq!(*results.lock().unwrap(), vec![None]);
    assert_eq!(peripheral.count(&Call::Release), 1);
    assert_eq!(peripheral.count(&Call::Disconnect(phone())), 1);
}

#[tokio::test]
async fn committed_lock_is_enforced_on_the_next_run() {
    let (service, peripheral, results) = service_with(None);
    service.start("https://example.com").await.unwrap();
    let handler = peripheral.handler();
    handler.on_connect(phone());
    handler.on_write(phone(), ConfigCharacteristic::UriData, b"\x03example\x08").unwrap();
    handler.on_write(phone(), ConfigCharacteristic::LockState, &[0x00]).unwrap();

    let committed = results.lock().unwrap()[0].clone().unwrap();
    assert_eq!(committed.lock_state, LockState::Locked);
    assert!(peripheral.calls().contains(&Call::Disconnect(phone())));

    service.start("https://example.org").await.unwrap();
    let handler = peripheral.handler();
    handler.on_connect(phone());
    assert_eq!(
        handler.on_write(phone(), ConfigCharacteristic::Flags, &[0x01]),
        Err(GattStatus::InsufficientAuthorization)
    );
    unlock(&handler, &committed.lock_key).unwrap();
    handler.on_write(phone(), ConfigCharacteristic::Flags, &[0x01]).unwrap();
    handler.on_disconnect(phone());

    let second = results.lock().unwrap()[1].clone().unwrap();
    assert_eq!(second.flags, 0x01);
    assert_eq!(second.lock_state, LockState::Locked);
    assert_eq!(second.lock_key, committed.lock_key);
}

#[tokio::test]
async fn key_rotation_commits_the_new_key() {
    let key = LockKey::generate();
    let next = LockKey::generate();
    let (service, peripheral, results) = service_with(Some(locked_seed(&key)));
    service.start("https://example.com").await.unwrap();
    let handler = peripheral.handler();
    handler.on_connect(phone());
    unlock(&handler, &key).unwrap();

    let mut value = vec![0x00];
    value.extend_from_slice(&key.wrap(&next));
    handler.on_write(phone(), ConfigCharacteristic::LockState, &value).unwrap();

    let committed = results.lock().unwrap()[0].clone().unwrap();
    assert_eq!(committed.lock_key, next);
    assert_eq!(service.configuration().unwrap().lock_key, next);
}

#[tokio::test]
async fn rejected_write_keeps_session_authenticated() {
    let (service, peripheral, results) = service_with(None);
    service.start("https://example.com").await.unwrap();
    let handler = peripheral.handler();
    handler.on_connect(phone());
    handler.on_read(phone(), ConfigCharacteristic::LockState).unwrap();

    let too_long = [b'a'; 19];
    assert_eq!(
        handler.on_write(phone(), ConfigCharacteristic::UriData, &too_long),
        Err(GattStatus::InvalidAttributeValueLength)
    );
    assert_eq!(service.state(), ServiceState::Authenticated);
    assert_eq!(service.configuration().unwrap().advertised_url, "https://example.com");

    handler.on_disconnect(phone());
    assert_eq!(*results.lock().unwrap(), vec![None]);
}

#[tokio::test]
async fn second_client_is_turned_away() {
    let (service, peripheral, results) = service_with(None);
    service.start("https://example.com").await.unwrap();
    let handler = peripheral.handler();
    handler.on_connect(phone());
    handler.on_connect(other_phone());

    assert!(peripheral.calls().contains(&Call::Disconnect(other_phone())));
    assert_eq!(
        handler.on_write(other_phone(), ConfigCharacteristic::Flags, &[0x01]),
        Err(GattStatus::WriteNotPermitted)
    );
    handler.on_disconnect(other_phone());
    assert_eq!(service.state(), ServiceState::Connected);
    assert!(results.lock().unwrap().is_empty());
}

#[tokio::test]
async fn first_request_implies_a_connection() {
    let (service, peripheral, _results) = service_with(None);
    service.start("https://example.com").await.unwrap();
    let handler = peripheral.handler();
    assert_eq!(handler.on_read(phone(), ConfigCharacteristic::BeaconPeriod), Ok(vec![0xe8, 0x03]));
    assert_eq!(service.state(), ServiceState::Connected);
    assert!(peripheral.calls().contains(&Call::StopAdvertising));
}

#[tokio::test]
async fn start_while_running_fails() {
    let (service, _peripheral, _results) = service_with(None);
    service.start("https://example.com").await.unwrap();
    assert!(matches!(service.start("https://example.com").await, Err(AppError::AlreadyStarted)));
    assert_eq!(service.state(), ServiceState::Advertising);
}

#[tokio::test]
async fn advertising_failure_releases_and_allows_retry() {
    let (service, peripheral, results) = service_with(None);
    peripheral.0.fail_advertise.store(true, Ordering::SeqCst);

    let result = service.start("https://example.com").await;
    assert!(matches!(result, Err(AppError::PeripheralUnavailable(_))));
    assert_eq!(service.state(), ServiceState::Idle);
    assert_eq!(peripheral.count(&Call::Release), 1);
    assert!(results.lock().unwrap().is_empty());

    peripheral.0.fail_advertise.store(false, Ordering::SeqCst);
    service.start("https://example.com").await.unwrap();
    assert_eq!(service.state(), ServiceState::Advertising);
}

#[tokio::test]
async fn transport_failure_reports_no_configuration() {
    let (service, peripheral, results) = service_with(None);
    service.start("https://example.com").await.unwrap();
    let handler = peripheral.handler();
    handler.on_connect(phone());
    handler.on_write(phone(), ConfigCharacteristic::Flags, &[0x04]).unwrap();

    handler.on_transport_error("link lost");

    assert_eq!(*results.lock().unwrap(), vec![None]);
    assert_eq!(service.state(), ServiceState::Idle);
    assert!(peripheral.calls().contains(&Call::Disconnect(phone())));
}

#[tokio::test]
async fn close_during_a_committing_write_leaves_teardown_to_the_writer() {
    let key = LockKey::generate();
    let next = LockKey::generate();
    let (service, peripheral, results) = service_with(Some(locked_seed(&key)));
    service.start("https://example.com").await.unwrap();
    let handler = peripheral.handler();
    handler.on_connect(phone());
    unlock(&handler, &key).unwrap();

    let (reached, resume) = peripheral.pause_next_disconnect();
    let mut value = vec![0x00];
    value.extend_from_slice(&key.wrap(&next));
    let writer = {
        let handler = handler.clone();
        thread::spawn(move || handler.on_write(phone(), ConfigCharacteristic::LockState, &value))
    };

    // The writer is now inside teardown with the session already taken.
    reached.recv().unwrap();
    service.close();
    assert_eq!(service.state(), ServiceState::Closing);
    assert!(matches!(service.start("https://example.org").await, Err(AppError::AlreadyStarted)));

    resume.send(()).unwrap();
    assert_eq!(writer.join().unwrap(), Ok(()));

    assert_eq!(results.lock().unwrap().len(), 1);
    assert_eq!(service.state(), ServiceState::Idle);
    assert_eq!(peripheral.calls().last(), Some(&Call::Release));
    assert_eq!(peripheral.count(&Call::Release), 1);

    service.start("https://example.org").await.unwrap();
    assert_eq!(service.state(), ServiceState::Advertising);
    assert_eq!(peripheral.calls().last(), Some(&Call::Advertise(*SERVICE_UUID)));
    let run = service.configuration().unwrap();
    assert_eq!(run.lock_key, next);
    assert_eq!(run.lock_state, LockState::Locked);
    assert_eq!(run.advertised_url, "https://example.org");
}
