use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde::Deserialize;
use svc_bus::{BusConfig, Message, MessageTypeId, PropertyTypeId, ServiceId, Subscriber, Subsystem};
use svc_registry::{
    AppConfig, Application, Properties, PropertiesConsumer, PropertiesObject, Registry, Service,
};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Configured(String),
    Ready(u8),
}

impl Message for Event {
    fn msg_id(&self) -> MessageTypeId {
        match self {
            Self::Configured(_) => MessageTypeId::new(Subsystem::User, 0),
            Self::Ready(_) => MessageTypeId::new(Subsystem::User, 1),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Greeting {
    name: String,
}

impl Properties for Greeting {
    const ID: PropertyTypeId = PropertyTypeId::new(Subsystem::User, 0);
}

type Journal = Arc<Mutex<Vec<String>>>;

struct Greeter {
    id: ServiceId,
    journal: Journal,
    name: Mutex<Option<String>>,
}

impl Service<Event> for Greeter {
    fn service_id(&self) -> ServiceId {
        self.id
    }

    fn setup(&self, registry: &Registry<Event>) {
        let name = self.name.lock().unwrap().clone().unwrap_or_default();
        self.journal
            .lock()
            .unwrap()
            .push(format!("setup {} name={name:?}", self.id.local()));
        registry.bus().post_message(Event::Ready(self.id.local()));
    }
}

impl PropertiesConsumer for Greeter {
    fn apply_properties(&self, props: &PropertiesObject) {
        if let Some(greeting) = props.get::<Greeting>() {
            *self.name.lock().unwrap() = Some(greeting.name.clone());
        }
    }
}

impl Subscriber<Event> for Greeter {
    fn on_message(&self, msg: &Event) {
        if let Event::Ready(from) = msg {
            self.journal
                .lock()
                .unwrap()
                .push(format!("{} saw ready {from}", self.id.local()));
        }
    }
}

fn configure(registry: &mut Registry<Event>, journal: &Journal) {
    registry.properties().add_json_reader::<Greeting>("greeting");
    for local in [2, 1] {
        registry.create::<Greeter, _>(|ctx| {
            ctx.consume_properties();
            ctx.subscribe();
            Greeter {
                id: ServiceId::new(Subsystem::User, local),
                journal: Arc::clone(journal),
                name: Mutex::new(None),
            }
        });
    }
}

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn boot_loads_properties_before_setup_in_id_order() {
    let file = config_file(r#"{ "greeting": { "name": "bus" }, "extra": { "x": 1 } }"#);
    let config = AppConfig::builder().config_path(file.path()).build();
    let mut app = Application::<Event>::new(config).unwrap();
    let journal = Journal::default();

    let report = app.setup(|registry| configure(registry, &journal)).unwrap();
    assert_eq!(report.applied, vec!["greeting"]);
    assert_eq!(report.skipped, vec!["extra"]);

    app.registry().bus().run_until_idle();

    assert_eq!(
        *journal.lock().unwrap(),
        vec![
            "setup 1 name=\"bus\"",
            "setup 2 name=\"bus\"",
            "1 saw ready 1",
            "2 saw ready 1",
            "1 saw ready 2",
            "2 saw ready 2",
        ]
    );
}

#[test]
fn missing_document_still_sets_services_up() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig::builder()
        .config_path(dir.path().join("absent.json"))
        .build();
    let mut app = Application::<Event>::new(config).unwrap();
    let journal = Journal::default();

    assert!(app.setup(|registry| configure(registry, &journal)).is_none());

    let journal = journal.lock().unwrap();
    assert_eq!(journal[0], "setup 1 name=\"\"");
    assert_eq!(journal[1], "setup 2 name=\"\"");
}

#[test]
fn run_drains_the_queue_once_stopped() {
    let file = config_file("{}");
    let config = AppConfig::builder()
        .config_path(file.path())
        .bus(BusConfig::builder().receive_timeout(Duration::from_millis(10)).build())
        .build();
    let mut app = Application::<Event>::new(config).unwrap();
    let journal = Journal::default();
    app.setup(|registry| configure(registry, &journal));

    let running = Arc::new(AtomicBool::new(true));
    let stopper = {
        let running = Arc::clone(&running);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            running.store(false, Ordering::Relaxed);
        })
    };
    app.run(&running);
    stopper.join().unwrap();

    assert_eq!(app.registry().bus().pending(), 0);
    assert_eq!(journal.lock().unwrap().len(), 6);
}
