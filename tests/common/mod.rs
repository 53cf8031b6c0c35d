//! Scripted in-process portal for the integration tests
//!
//! `FakeSite` holds the report pages and records what the worker did to it;
//! `FakeBrowser` / `FakeTab` / `FakeElement` implement the driver traits on
//! top of it by answering the selectors of `taqeem_worker::site`.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

use taqeem_worker::browser::{BrowserDriver, Element, Tab};
use taqeem_worker::config::{Config, Timings};
use taqeem_worker::context::WorkerContext;
use taqeem_worker::control::{BatchId, ControlToken};
use taqeem_worker::error::{AppError, AppResult, BrowserError};
use taqeem_worker::models::{DocumentStore, FormSpecs, MemoryStore};
use taqeem_worker::services::OutputChannel;
use taqeem_worker::site;

pub const REPORT: &str = "5001";

/// One row of the report table
#[derive(Debug, Clone)]
pub struct Row {
    pub id: String,
    pub status: String,
}

impl Row {
    pub fn complete(id: u64) -> Self {
        Self {
            id: id.to_string(),
            status: "مكتملة".to_string(),
        }
    }

    pub fn incomplete(id: u64) -> Self {
        Self {
            id: id.to_string(),
            status: site::INCOMPLETE_MARKER.to_string(),
        }
    }

    /// Row with arbitrary id cell text
    pub fn raw(text: &str) -> Self {
        Self {
            id: text.to_string(),
            status: "مكتملة".to_string(),
        }
    }
}

/// Sub-pages of one outer page
pub type Page = Vec<Vec<Row>>;

/// `pages` outer pages of `subs` sub-pages with `per_sub` complete rows each.
/// Ids read `page * 1000 + sub * 100 + row`.
pub fn uniform_pages(pages: usize, subs: usize, per_sub: usize) -> Vec<Page> {
    (1..=pages)
        .map(|p| {
            (1..=subs)
                .map(|s| {
                    (1..=per_sub)
                        .map(|r| Row::complete((p * 1000 + s * 100 + r) as u64))
                        .collect()
                })
                .collect()
        })
        .collect()
}

type Hook = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct SiteState {
    pages: Vec<Page>,
    missing: bool,
    delete_button: bool,
    stuck_next: bool,
    reject_asset_form: bool,
    failing_urls: HashSet<String>,
    hold_secondary: Option<CancellationToken>,
    secondary_closed: bool,
    hooks: Vec<(String, Hook)>,
    navigations: Vec<(usize, String)>,
    scripts: Vec<String>,
    submits: Vec<(usize, String)>,
    opened_tabs: usize,
    closed_tabs: Vec<usize>,
    shutdown: bool,
}

#[derive(Clone, Default)]
pub struct FakeSite {
    state: Arc<Mutex<SiteState>>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pages(pages: Vec<Page>) -> Self {
        let site = Self::new();
        site.lock().pages = pages;
        site
    }

    fn lock(&self) -> MutexGuard<'_, SiteState> {
        self.state.lock().unwrap()
    }

    // ---- scripting ----

    pub fn set_missing(&self) {
        self.lock().missing = true;
    }

    pub fn set_delete_button(&self) {
        self.lock().delete_button = true;
    }

    /// "next" stays enabled but clicking it never redraws the table
    pub fn set_stuck_next(&self) {
        self.lock().stuck_next = true;
    }

    /// The asset form redirects away from the report
    pub fn set_reject_asset_form(&self) {
        self.lock().reject_asset_form = true;
    }

    /// Both the navigation and its fallback fail for `url`
    pub fn fail_url(&self, url: impl Into<String>) {
        self.lock().failing_urls.insert(url.into());
    }

    /// Secondary tabs block in `navigate` until the returned gate is
    /// cancelled or the secondary tabs are closed.
    pub fn hold_secondary_tabs(&self) -> CancellationToken {
        let gate = CancellationToken::new();
        self.lock().hold_secondary = Some(gate.clone());
        gate
    }

    /// Run `hook` whenever any tab navigates to `url`
    pub fn on_navigate(&self, url: impl Into<String>, hook: impl Fn() + Send + Sync + 'static) {
        self.lock().hooks.push((url.into(), Arc::new(hook)));
    }

    // ---- inspection ----

    pub fn navigations(&self) -> Vec<(usize, String)> {
        self.lock().navigations.clone()
    }

    /// Distinct outer pages a tab navigated to, in first-visit order
    pub fn pages_visited_by(&self, tab: usize) -> Vec<usize> {
        let mut pages = Vec::new();
        for (index, url) in self.navigations() {
            if index != tab {
                continue;
            }
            if let Some(page) = report_page_of(&url) {
                if !pages.contains(&page) {
                    pages.push(page);
                }
            }
        }
        pages
    }

    pub fn scripts(&self) -> Vec<String> {
        self.lock().scripts.clone()
    }

    pub fn submits(&self) -> Vec<(usize, String)> {
        self.lock().submits.clone()
    }

    pub fn opened_tabs(&self) -> usize {
        self.lock().opened_tabs
    }

    pub fn closed_tabs(&self) -> Vec<usize> {
        self.lock().closed_tabs.clone()
    }

    /// Whether `close_secondary_tabs` was called
    pub fn secondary_tabs_closed(&self) -> bool {
        self.lock().secondary_closed
    }

    pub fn is_shutdown(&self) -> bool {
        self.lock().shutdown
    }
}

/// Outer page number of a report URL
pub fn report_page_of(url: &str) -> Option<usize> {
    let rest = url.strip_prefix(&format!("{}/report/", site::BASE_URL))?;
    if rest.starts_with("macro/") || rest.starts_with("asset/") {
        return None;
    }
    match rest.split_once("?page=") {
        Some((_, page)) => page.parse().ok(),
        None => Some(1),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageKind {
    Blank,
    Report,
    AssetForm,
    EditForm,
}

#[derive(Debug, Clone)]
struct View {
    url: String,
    kind: PageKind,
    page: usize,
    sub: usize,
}

impl View {
    fn blank() -> Self {
        Self {
            url: "about:blank".to_string(),
            kind: PageKind::Blank,
            page: 0,
            sub: 0,
        }
    }
}

pub struct FakeBrowser {
    site: FakeSite,
    primary: Arc<FakeTab>,
}

impl FakeBrowser {
    pub fn new(site: FakeSite) -> Self {
        let primary = Arc::new(FakeTab::new(0, site.clone()));
        Self { site, primary }
    }
}

#[async_trait]
impl BrowserDriver for FakeBrowser {
    async fn primary_tab(&self) -> AppResult<Arc<dyn Tab>> {
        Ok(self.primary.clone())
    }

    async fn open_tab(&self, url: &str) -> AppResult<Arc<dyn Tab>> {
        let index = {
            let mut state = self.site.lock();
            state.opened_tabs += 1;
            state.opened_tabs
        };
        let tab = FakeTab::new(index, self.site.clone());
        tab.load(url);
        Ok(Arc::new(tab))
    }

    async fn close_secondary_tabs(&self) -> AppResult<usize> {
        let mut state = self.site.lock();
        state.secondary_closed = true;
        if let Some(gate) = &state.hold_secondary {
            gate.cancel();
        }
        Ok(state.opened_tabs)
    }

    async fn shutdown(&self) -> AppResult<()> {
        self.site.lock().shutdown = true;
        Ok(())
    }
}

pub struct FakeTab {
    index: usize,
    site: FakeSite,
    view: Arc<Mutex<View>>,
}

impl FakeTab {
    fn new(index: usize, site: FakeSite) -> Self {
        Self {
            index,
            site,
            view: Arc::new(Mutex::new(View::blank())),
        }
    }

    fn load(&self, url: &str) {
        let reject = self.site.lock().reject_asset_form;
        let mut view = self.view.lock().unwrap();
        *view = View::blank();
        view.url = url.to_string();
        if url.contains("/report/asset/create/") {
            if reject {
                view.url = format!("{}/dashboard", site::BASE_URL);
            } else {
                view.kind = PageKind::AssetForm;
            }
        } else if url.contains("/report/macro/") && url.ends_with("/edit") {
            view.kind = PageKind::EditForm;
        } else if let Some(page) = report_page_of(url) {
            view.kind = PageKind::Report;
            view.page = page;
        }
    }

    fn view(&self) -> View {
        self.view.lock().unwrap().clone()
    }

    /// Rows of the sub-page currently shown
    fn current_rows(&self) -> Vec<Row> {
        let view = self.view();
        let state = self.site.lock();
        if view.kind != PageKind::Report || state.missing || view.page == 0 {
            return Vec::new();
        }
        state
            .pages
            .get(view.page - 1)
            .and_then(|subs| subs.get(view.sub))
            .cloned()
            .unwrap_or_default()
    }

    fn sub_page_count(&self) -> usize {
        let view = self.view();
        let state = self.site.lock();
        if view.page == 0 {
            return 0;
        }
        state.pages.get(view.page - 1).map_or(0, Vec::len)
    }

    fn element(&self, text: &str, click: Click) -> Box<dyn Element> {
        Box::new(FakeElement {
            text: Some(text.to_string()),
            attrs: Vec::new(),
            click,
            tab_index: self.index,
            site: self.site.clone(),
            view: self.view.clone(),
        })
    }

    fn navigation_error(url: &str) -> AppError {
        AppError::navigation(
            url,
            std::io::Error::new(std::io::ErrorKind::TimedOut, "net::ERR_TIMED_OUT"),
        )
    }
}

#[async_trait]
impl Tab for FakeTab {
    async fn navigate(&self, url: &str) -> AppResult<()> {
        let (gate, hooks, failing) = {
            let mut state = self.site.lock();
            state.navigations.push((self.index, url.to_string()));
            let gate = if self.index > 0 {
                state.hold_secondary.clone()
            } else {
                None
            };
            let hooks: Vec<Hook> = state
                .hooks
                .iter()
                .filter(|(hook_url, _)| hook_url == url)
                .map(|(_, hook)| hook.clone())
                .collect();
            (gate, hooks, state.failing_urls.contains(url))
        };

        if let Some(gate) = gate {
            gate.cancelled().await;
            if self.site.lock().secondary_closed {
                return Err(BrowserError::TabClosed.into());
            }
        }
        for hook in hooks {
            hook();
        }
        if failing {
            return Err(Self::navigation_error(url));
        }
        self.load(url);
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> AppResult<JsonValue> {
        if script == "document.readyState" {
            return Ok(json!("complete"));
        }
        if let Some(arg) = script
            .strip_prefix("window.location.assign(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let url: String = serde_json::from_str(arg)?;
            if self.index > 0 && self.site.lock().secondary_closed {
                return Err(BrowserError::TabClosed.into());
            }
            if self.site.lock().failing_urls.contains(&url) {
                return Err(AppError::script(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "net::ERR_TIMED_OUT",
                )));
            }
            self.load(&url);
            return Ok(JsonValue::Null);
        }
        if script.contains("parseInt(last.textContent") {
            let last = self.site.lock().pages.len();
            if last == 0 {
                return Ok(JsonValue::Null);
            }
            let mut view = self.view.lock().unwrap();
            view.page = last;
            view.sub = 0;
            return Ok(json!(last));
        }
        self.site.lock().scripts.push(script.to_string());
        Ok(json!(1))
    }

    async fn find_element(&self, selector: &str) -> AppResult<Option<Box<dyn Element>>> {
        let view = self.view();
        let (delete_button, stuck_next, missing) = {
            let state = self.site.lock();
            (state.delete_button, state.stuck_next, state.missing)
        };
        let found = match (selector, view.kind) {
            (site::SUBPAGE_NEXT, PageKind::Report) if !self.current_rows().is_empty() => {
                let last = view.sub + 1 >= self.sub_page_count();
                let class = if last && !stuck_next {
                    "paginate_button next disabled"
                } else {
                    "paginate_button next"
                };
                Some(Box::new(FakeElement {
                    text: Some("Next".to_string()),
                    attrs: vec![("class".to_string(), class.to_string())],
                    click: Click::NextSubPage,
                    tab_index: self.index,
                    site: self.site.clone(),
                    view: self.view.clone(),
                }) as Box<dyn Element>)
            }
            (site::PAGINATION_ITEM, PageKind::Report) if !missing => Some(self.element("1", Click::Nothing)),
            (site::DELETE_REPORT_BUTTON, PageKind::Report) if delete_button => {
                Some(self.element("Delete", Click::Nothing))
            }
            (site::ASSET_FORM_ANCHOR, PageKind::AssetForm) => Some(self.element("", Click::Nothing)),
            (site::MACRO_EDIT_ANCHOR, PageKind::EditForm) => Some(self.element("", Click::Nothing)),
            (site::SUBMIT_BUTTON, PageKind::AssetForm | PageKind::EditForm) => {
                Some(self.element("Save", Click::Submit))
            }
            _ => None,
        };
        Ok(found)
    }

    async fn find_all(&self, selector: &str) -> AppResult<Vec<Box<dyn Element>>> {
        let view = self.view();
        if view.kind != PageKind::Report {
            return Ok(Vec::new());
        }
        let elements = match selector {
            site::MACRO_ID_CELLS => self
                .current_rows()
                .into_iter()
                .map(|row| {
                    Box::new(FakeElement {
                        attrs: vec![("href".to_string(), format!("/report/macro/{}/show", row.id))],
                        text: Some(row.id),
                        click: Click::Nothing,
                        tab_index: self.index,
                        site: self.site.clone(),
                        view: self.view.clone(),
                    }) as Box<dyn Element>
                })
                .collect(),
            site::STATUS_CELLS => self
                .current_rows()
                .into_iter()
                .map(|row| self.element(&row.status, Click::Nothing))
                .collect(),
            site::PAGINATION_LINKS => {
                let pages = self.site.lock().pages.len();
                let mut links: Vec<Box<dyn Element>> = (1..=pages)
                    .map(|n| self.element(&n.to_string(), Click::Nothing))
                    .collect();
                links.push(self.element("»", Click::Nothing));
                links
            }
            _ => Vec::new(),
        };
        Ok(elements)
    }

    async fn current_url(&self) -> AppResult<String> {
        Ok(self.view().url)
    }

    async fn content(&self) -> AppResult<String> {
        if self.site.lock().missing {
            return Ok(format!("<h1>{}</h1>", site::PAGE_MISSING_MARKER));
        }
        Ok("<html><body>report</body></html>".to_string())
    }

    async fn close(&self) -> AppResult<()> {
        self.site.lock().closed_tabs.push(self.index);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Click {
    Nothing,
    NextSubPage,
    Submit,
}

pub struct FakeElement {
    text: Option<String>,
    attrs: Vec<(String, String)>,
    click: Click,
    tab_index: usize,
    site: FakeSite,
    view: Arc<Mutex<View>>,
}

#[async_trait]
impl Element for FakeElement {
    async fn text(&self) -> AppResult<Option<String>> {
        Ok(self.text.clone())
    }

    async fn attribute(&self, name: &str) -> AppResult<Option<String>> {
        Ok(self
            .attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone()))
    }

    async fn click(&self) -> AppResult<()> {
        match self.click {
            Click::Nothing => {}
            Click::NextSubPage => {
                if !self.site.lock().stuck_next {
                    self.view.lock().unwrap().sub += 1;
                }
            }
            Click::Submit => {
                let url = self.view.lock().unwrap().url.clone();
                self.site.lock().submits.push((self.tab_index, url));
            }
        }
        Ok(())
    }
}

// ========== harness ==========

pub fn fast_timings() -> Timings {
    Timings {
        poll_interval_ms: 1,
        table_ready_timeout_ms: 40,
        next_button_timeout_ms: 10,
        redraw_timeout_ms: 20,
        settle_delay_ms: 0,
        render_delay_ms: 0,
        element_timeout_ms: 30,
        submit_timeout_ms: 20,
        submit_settle_ms: 0,
        control_poll_ms: 1,
        navigation_backoff_ms: 0,
        max_sub_pages: 50,
    }
}

pub fn test_config() -> Config {
    Config {
        store_dir: None,
        default_tabs: 3,
        create_batch_size: 10,
        timings: fast_timings(),
        ..Config::default()
    }
}

pub struct Harness {
    pub site: FakeSite,
    pub store: Arc<MemoryStore>,
    pub ctx: WorkerContext,
    pub records: UnboundedReceiver<JsonValue>,
}

impl Harness {
    pub fn new(site: FakeSite) -> Self {
        Self::with_config(site, test_config())
    }

    pub fn with_config(site: FakeSite, config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        let (output, records) = OutputChannel::new();
        let browser: Arc<dyn BrowserDriver> = Arc::new(FakeBrowser::new(site.clone()));
        let ctx = WorkerContext::new(
            config,
            browser,
            store.clone() as Arc<dyn DocumentStore>,
            output,
            FormSpecs::default(),
        );
        Self {
            site,
            store,
            ctx,
            records,
        }
    }

    /// Progress records emitted so far
    pub fn drain_records(&mut self) -> Vec<JsonValue> {
        let mut records = Vec::new();
        while let Ok(record) = self.records.try_recv() {
            records.push(record);
        }
        records
    }
}

pub fn token(batch: &str) -> Arc<ControlToken> {
    Arc::new(ControlToken::new(BatchId::new(batch), Duration::from_millis(1)))
}
