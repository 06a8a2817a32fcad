use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tally_events::{DomainEvents, Event, EventBus, EventKind, Isolation};
use tally_server::config::Environment;
use tally_server::themes::{
    check_theme, upload_theme, CheckOptions, CheckedTheme, ThemeChecker, ThemeError, ThemeIssue,
    ThemeSource,
};

struct FakeChecker {
    result: CheckedTheme,
    seen: Mutex<Vec<CheckOptions>>,
}

impl FakeChecker {
    fn new(errors: Vec<ThemeIssue>) -> Self {
        Self {
            result: CheckedTheme {
                name: "casper".to_string(),
                version: Some("5.0.0".to_string()),
                errors,
                warnings: Vec::new(),
            },
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ThemeChecker for FakeChecker {
    async fn check(
        &self,
        _source: &ThemeSource,
        options: &CheckOptions,
    ) -> Result<CheckedTheme, ThemeError> {
        self.seen.lock().unwrap().push(*options);
        Ok(self.result.clone())
    }
}

fn issue(rule: &str, fatal: bool) -> ThemeIssue {
    ThemeIssue {
        rule: rule.to_string(),
        message: format!("{rule} failed"),
        fatal,
    }
}

fn zip() -> ThemeSource {
    ThemeSource::Zip(PathBuf::from("/tmp/casper.zip"))
}

#[test]
fn options_follow_environment_and_source() {
    let dev_zip = CheckOptions::for_environment(Environment::Development, &zip());
    assert!(dev_zip.keep_extracted_dir);
    assert!(dev_zip.detect_package_json_errors);
    assert!(dev_zip.detect_deprecated_css_errors);

    let prod_dir = CheckOptions::for_environment(
        Environment::Production,
        &ThemeSource::Directory(PathBuf::from("/themes/casper")),
    );
    assert!(!prod_dir.keep_extracted_dir);
    assert!(!prod_dir.detect_package_json_errors);
    assert!(!prod_dir.detect_deprecated_css_errors);
}

#[tokio::test]
async fn clean_and_non_fatal_results_are_accepted() {
    let clean = FakeChecker::new(Vec::new());
    let checked = check_theme(&clean, &zip(), Environment::Production)
        .await
        .unwrap();
    assert_eq!(checked.name, "casper");
    assert!(!clean.seen.lock().unwrap()[0].detect_package_json_errors);

    let minor = FakeChecker::new(vec![issue("GS010-PJ-REQ", false)]);
    let checked = check_theme(&minor, &zip(), Environment::Development)
        .await
        .unwrap();
    assert_eq!(checked.errors.len(), 1);
}

#[tokio::test]
async fn fatal_errors_reject_with_every_error() {
    let checker = FakeChecker::new(vec![issue("GS005-TPL-ERR", true), issue("GS010-PJ-REQ", false)]);

    let err = check_theme(&checker, &zip(), Environment::Development)
        .await
        .unwrap_err();

    match err {
        ThemeError::Validation { errors } => {
            assert_eq!(errors.len(), 2);
            assert!(errors[0].fatal);
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn accepted_upload_publishes_theme_uploaded() {
    let bus = DomainEvents::new();
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    bus.subscribe(
        EventKind::model("theme.uploaded"),
        Isolation::default().isolate("test:themes", move |event: Arc<Event>| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().unwrap().push((*event).clone());
                Ok::<_, std::io::Error>(())
            }
        }),
    );

    let checker = FakeChecker::new(Vec::new());
    upload_theme(&checker, &bus, &zip(), Environment::Development)
        .await
        .unwrap();
    bus.settled().await;

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    match &received[0] {
        Event::Model(model) => {
            assert_eq!(model.event, "theme.uploaded");
            assert_eq!(model.data["name"], "casper");
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn rejected_upload_publishes_nothing() {
    let bus = DomainEvents::new();
    let checker = FakeChecker::new(vec![issue("GS005-TPL-ERR", true)]);

    let result = upload_theme(&checker, &bus, &zip(), Environment::Production).await;

    assert!(result.is_err());
    bus.settled().await;
}
