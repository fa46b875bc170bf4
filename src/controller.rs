use crate::reply::ReplyService;
use crate::transcript::ChatView;
use crate::types::{ExchangeId, Message, Timestamp};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

pub const FALLBACK_REPLY: &str = "Sorry, I encountered an error. Please try again.";

/// Order in which bot replies reach the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    /// Append each reply as soon as it settles.
    #[default]
    Arrival,
    /// Hold early replies until every earlier exchange has been shown.
    Submission,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Resolved(String),
    Rejected,
}

#[derive(Debug)]
struct Settled {
    exchange: ExchangeId,
    timestamp: Timestamp,
    outcome: Outcome,
}

type Clock = Box<dyn Fn() -> Timestamp + Send>;

pub struct Controller<V, S> {
    view: V,
    service: Arc<S>,
    clock: Clock,
    delivery: Delivery,
    next_id: u64,
    in_flight: usize,
    settled_tx: mpsc::UnboundedSender<Settled>,
    settled_rx: mpsc::UnboundedReceiver<Settled>,
    // Submission order only: replies waiting for an earlier exchange.
    held: BTreeMap<ExchangeId, Settled>,
    next_flush: u64,
}

impl<V, S> Controller<V, S>
where
    V: ChatView,
    S: ReplyService + 'static,
{
    pub fn new(view: V, service: Arc<S>) -> Self {
        let (settled_tx, settled_rx) = mpsc::unbounded_channel();
        Self {
            view,
            service,
            clock: Box::new(Timestamp::now),
            delivery: Delivery::default(),
            next_id: 0,
            in_flight: 0,
            settled_tx,
            settled_rx,
            held: BTreeMap::new(),
            next_flush: 0,
        }
    }

    pub fn with_delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn with_clock(mut self, clock: impl Fn() -> Timestamp + Send + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn into_view(self) -> V {
        self.view
    }

    /// Exchanges whose reply has not been rendered yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Renders the user's message with a pending indicator and sends it.
    ///
    /// Must be called from within a tokio runtime. The text is neither
    /// trimmed nor validated; an empty string is sent like any other.
    pub fn submit(&mut self, raw_text: String) -> ExchangeId {
        let exchange = ExchangeId(self.next_id);
        self.next_id += 1;

        let timestamp = (self.clock)();
        self.view.append(Message::user(raw_text.clone(), timestamp));
        self.view.clear_input();
        self.view.show_pending(exchange);
        self.view.scroll_to_end();

        self.in_flight += 1;
        debug!(%exchange, len = raw_text.len(), "exchange submitted");

        let service = Arc::clone(&self.service);
        let tx = self.settled_tx.clone();
        tokio::spawn(async move {
            let outcome = match service.reply(&raw_text).await {
                Ok(body) => Outcome::Resolved(body),
                Err(_) => Outcome::Rejected,
            };
            let _ = tx.send(Settled {
                exchange,
                timestamp,
                outcome,
            });
        });

        exchange
    }

    /// Waits for the next exchange to settle and renders whatever it
    /// releases. Returns the exchange that settled, or `None` when nothing
    /// is in flight.
    pub async fn next_settled(&mut self) -> Option<ExchangeId> {
        if self.in_flight == 0 {
            return None;
        }
        let settled = self.settled_rx.recv().await?;
        let exchange = settled.exchange;
        match &settled.outcome {
            Outcome::Resolved(_) => debug!(%exchange, "exchange resolved"),
            Outcome::Rejected => debug!(%exchange, "exchange rejected"),
        }

        match self.delivery {
            Delivery::Arrival => self.render_reply(settled),
            Delivery::Submission => {
                self.held.insert(exchange, settled);
                while let Some(ready) = self.held.remove(&ExchangeId(self.next_flush)) {
                    self.next_flush += 1;
                    self.render_reply(ready);
                }
                if !self.held.is_empty() {
                    debug!(held = self.held.len(), "replies held for earlier exchanges");
                }
            }
        }
        Some(exchange)
    }

    /// Renders every outstanding reply. Never returns while a request is
    /// still unanswered.
    pub async fn settle_all(&mut self) {
        while self.in_flight > 0 {
            if self.next_settled().await.is_none() {
                break;
            }
        }
    }

    fn render_reply(&mut self, settled: Settled) {
        let Settled {
            exchange,
            timestamp,
            outcome,
        } = settled;
        self.view.remove_pending(exchange);
        let text = match outcome {
            Outcome::Resolved(body) => body,
            Outcome::Rejected => FALLBACK_REPLY.to_string(),
        };
        self.view.append(Message::bot(text, timestamp));
        self.view.scroll_to_end();
        self.in_flight -= 1;
        debug!(%exchange, "reply rendered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::ReplyError;
    use crate::transcript::Transcript;
    use crate::types::{Author, Entry};
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    fn nine_oh_five() -> Timestamp {
        Timestamp::new(9, 5)
    }

    /// Replies immediately with a fixed body, recording what it was sent.
    struct EchoService {
        reply: Result<String, StatusCode>,
        seen: Mutex<Vec<String>>,
    }

    impl EchoService {
        fn ok(body: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(body.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(StatusCode::SERVICE_UNAVAILABLE),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReplyService for EchoService {
        async fn reply(&self, msg: &str) -> Result<String, ReplyError> {
            self.seen.lock().unwrap().push(msg.to_string());
            match &self.reply {
                Ok(body) => Ok(body.clone()),
                Err(status) => Err(ReplyError::Status { status: *status }),
            }
        }
    }

    /// Holds each reply until the test releases it for that message.
    #[derive(Default)]
    struct ScriptedService {
        gates: Mutex<HashMap<String, oneshot::Receiver<Result<String, ()>>>>,
    }

    impl ScriptedService {
        fn gate(&self, msg: &str) -> oneshot::Sender<Result<String, ()>> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().insert(msg.to_string(), rx);
            tx
        }
    }

    #[async_trait]
    impl ReplyService for ScriptedService {
        async fn reply(&self, msg: &str) -> Result<String, ReplyError> {
            let rx = self.gates.lock().unwrap().remove(msg);
            match rx {
                Some(rx) => match rx.await {
                    Ok(Ok(body)) => Ok(body),
                    _ => Err(ReplyError::Malformed),
                },
                None => Err(ReplyError::Malformed),
            }
        }
    }

    /// Records every call the controller makes on its view.
    #[derive(Default)]
    struct RecordingView {
        calls: Vec<String>,
    }

    impl ChatView for RecordingView {
        fn append(&mut self, message: Message) {
            let who = match message.author {
                Author::User => "user",
                Author::Bot => "bot",
            };
            self.calls.push(format!("append {who} {}", message.text));
        }

        fn show_pending(&mut self, exchange: ExchangeId) {
            self.calls.push(format!("show {exchange}"));
        }

        fn remove_pending(&mut self, exchange: ExchangeId) -> bool {
            self.calls.push(format!("remove {exchange}"));
            true
        }

        fn clear_input(&mut self) {
            self.calls.push("clear".to_string());
        }

        fn scroll_to_end(&mut self) {
            self.calls.push("scroll".to_string());
        }
    }

    fn controller<S: ReplyService + 'static>(service: Arc<S>) -> Controller<Transcript, S> {
        Controller::new(Transcript::new(), service).with_clock(nine_oh_five)
    }

    fn bot_texts(transcript: &Transcript) -> Vec<String> {
        transcript
            .messages()
            .filter(|m| m.author == Author::Bot)
            .map(|m| m.text.clone())
            .collect()
    }

    #[tokio::test]
    async fn hello_round_trip() {
        let service = EchoService::ok("Hi there!");
        let mut ctl = controller(service.clone());

        let id = ctl.submit("Hello".to_string());
        assert_eq!(
            ctl.view().entries(),
            &[
                Entry::Message(Message::user("Hello", nine_oh_five())),
                Entry::Pending { exchange: id },
            ]
        );
        assert!(ctl.view().is_scrolled_to_end());

        assert_eq!(ctl.next_settled().await, Some(id));
        assert_eq!(
            ctl.view().entries(),
            &[
                Entry::Message(Message::user("Hello", nine_oh_five())),
                Entry::Message(Message::bot("Hi there!", nine_oh_five())),
            ]
        );
        assert!(ctl.view().is_scrolled_to_end());
        assert_eq!(service.seen(), vec!["Hello"]);
        assert_eq!(ctl.in_flight(), 0);
    }

    #[tokio::test]
    async fn empty_submit_still_calls_service() {
        let service = EchoService::ok("?");
        let mut ctl = controller(service.clone());

        ctl.submit(String::new());
        ctl.settle_all().await;

        let first = ctl.view().messages().next().unwrap();
        assert_eq!(first.author, Author::User);
        assert_eq!(first.text, "");
        assert_eq!(service.seen(), vec![""]);
    }

    #[tokio::test]
    async fn markup_is_stored_unescaped() {
        let service = EchoService::ok("<i>ok</i>");
        let mut ctl = controller(service);

        ctl.submit("<b>hi</b>".to_string());
        ctl.settle_all().await;

        let texts: Vec<_> = ctl.view().messages().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["<b>hi</b>", "<i>ok</i>"]);
    }

    #[tokio::test]
    async fn failure_appends_fallback() {
        let mut ctl = controller(EchoService::failing());

        ctl.submit("anyone?".to_string());
        ctl.settle_all().await;

        assert_eq!(bot_texts(ctl.view()), vec![FALLBACK_REPLY]);
        assert_eq!(ctl.view().pending().count(), 0);
    }

    #[tokio::test]
    async fn submit_clears_input() {
        let mut ctl = controller(EchoService::ok("x"));
        ctl.view_mut().set_input("typed");

        ctl.submit("typed".to_string());
        assert_eq!(ctl.view().input(), "");
        ctl.settle_all().await;
    }

    #[tokio::test]
    async fn repeated_submissions_are_not_deduplicated() {
        let mut ctl = controller(EchoService::ok("same"));

        ctl.submit("again".to_string());
        ctl.settle_all().await;
        ctl.submit("again".to_string());
        ctl.settle_all().await;

        let texts: Vec<_> = ctl.view().messages().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["again", "same", "again", "same"]);
    }

    #[tokio::test]
    async fn unanswered_request_keeps_indicator() {
        let service = Arc::new(ScriptedService::default());
        let _gate = service.gate("slow");
        let mut ctl = controller(service);

        let id = ctl.submit("slow".to_string());
        tokio::task::yield_now().await;

        assert_eq!(ctl.in_flight(), 1);
        assert_eq!(ctl.view().pending().collect::<Vec<_>>(), vec![id]);
        assert_eq!(ctl.view().entries().last(), Some(&Entry::Pending { exchange: id }));
    }

    #[tokio::test]
    async fn arrival_order_interleaves_replies() {
        let service = Arc::new(ScriptedService::default());
        let first = service.gate("first");
        let second = service.gate("second");
        let mut ctl = controller(service);

        let a = ctl.submit("first".to_string());
        let b = ctl.submit("second".to_string());
        assert_eq!(ctl.view().pending().collect::<Vec<_>>(), vec![a, b]);

        second.send(Ok("reply two".to_string())).unwrap();
        assert_eq!(ctl.next_settled().await, Some(b));
        assert_eq!(ctl.view().pending().collect::<Vec<_>>(), vec![a]);

        first.send(Ok("reply one".to_string())).unwrap();
        assert_eq!(ctl.next_settled().await, Some(a));

        assert_eq!(bot_texts(ctl.view()), vec!["reply two", "reply one"]);
        assert_eq!(ctl.view().pending().count(), 0);
    }

    #[tokio::test]
    async fn submission_order_holds_early_replies() {
        let service = Arc::new(ScriptedService::default());
        let first = service.gate("first");
        let second = service.gate("second");
        let mut ctl = controller(service).with_delivery(Delivery::Submission);

        let a = ctl.submit("first".to_string());
        let b = ctl.submit("second".to_string());

        second.send(Ok("reply two".to_string())).unwrap();
        assert_eq!(ctl.next_settled().await, Some(b));
        assert!(bot_texts(ctl.view()).is_empty());
        assert_eq!(ctl.view().pending().collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(ctl.in_flight(), 2);

        first.send(Err(())).unwrap();
        assert_eq!(ctl.next_settled().await, Some(a));

        assert_eq!(bot_texts(ctl.view()), vec![FALLBACK_REPLY, "reply two"]);
        assert_eq!(ctl.view().pending().count(), 0);
        assert_eq!(ctl.in_flight(), 0);
    }

    #[tokio::test]
    async fn reply_keeps_submit_timestamp() {
        let service = Arc::new(ScriptedService::default());
        let gate = service.gate("q");
        let minute = Arc::new(Mutex::new(0));
        let clock_minute = Arc::clone(&minute);
        let mut ctl = Controller::new(Transcript::new(), service)
            .with_clock(move || Timestamp::new(14, *clock_minute.lock().unwrap()));

        ctl.submit("q".to_string());
        *minute.lock().unwrap() = 9;
        gate.send(Ok("a".to_string())).unwrap();
        ctl.settle_all().await;

        let stamps: Vec<_> = ctl.view().messages().map(|m| m.timestamp.to_string()).collect();
        assert_eq!(stamps, vec!["14:0", "14:0"]);
    }

    #[tokio::test]
    async fn view_calls_follow_exchange_steps() {
        let mut ctl = Controller::new(RecordingView::default(), EchoService::ok("Hi there!"))
            .with_clock(nine_oh_five);

        ctl.submit("Hello".to_string());
        assert_eq!(
            ctl.view().calls,
            vec!["append user Hello", "clear", "show #0", "scroll"]
        );

        ctl.settle_all().await;
        assert_eq!(
            ctl.view().calls[4..],
            ["remove #0", "append bot Hi there!", "scroll"]
        );
    }

    #[tokio::test]
    async fn fallback_is_appended_after_indicator_removal() {
        let mut ctl = Controller::new(RecordingView::default(), EchoService::failing())
            .with_clock(nine_oh_five);

        ctl.submit(String::new());
        ctl.settle_all().await;

        let calls = ctl.into_view().calls;
        assert_eq!(
            calls,
            vec![
                "append user ".to_string(),
                "clear".to_string(),
                "show #0".to_string(),
                "scroll".to_string(),
                "remove #0".to_string(),
                format!("append bot {FALLBACK_REPLY}"),
                "scroll".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn submission_order_removes_each_indicator_before_its_reply() {
        let service = Arc::new(ScriptedService::default());
        let first = service.gate("first");
        let second = service.gate("second");
        let mut ctl = Controller::new(RecordingView::default(), service)
            .with_clock(nine_oh_five)
            .with_delivery(Delivery::Submission);

        ctl.submit("first".to_string());
        ctl.submit("second".to_string());
        second.send(Ok("two".to_string())).unwrap();
        ctl.next_settled().await;
        first.send(Ok("one".to_string())).unwrap();
        ctl.next_settled().await;

        assert_eq!(
            ctl.view().calls[8..],
            [
                "remove #0",
                "append bot one",
                "scroll",
                "remove #1",
                "append bot two",
                "scroll",
            ]
        );
    }

    #[tokio::test]
    async fn next_settled_without_work_returns_none() {
        let mut ctl = controller(EchoService::ok("x"));
        assert_eq!(ctl.next_settled().await, None);
    }
}
