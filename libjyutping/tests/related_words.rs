use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use jyutping_core::{Dictionary, DictionaryEntry, InMemoryRuleStore, MatchingRule, Provenance};
use libjyutping::{
    Engine, JyutpingConfig, Predictor, PredictorError, RecommendRequest, RelatedWordRecommender,
    Requester,
};

enum Reply {
    Words(Vec<&'static str>),
    Timeout,
}

/// Predictor with a fixed answer that records what it was asked.
struct Scripted {
    reply: Reply,
    calls: Arc<AtomicUsize>,
    contexts: Arc<Mutex<Vec<String>>>,
}

impl Scripted {
    fn new(reply: Reply) -> (Box<Self>, Arc<AtomicUsize>, Arc<Mutex<Vec<String>>>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let contexts = Arc::new(Mutex::new(Vec::new()));
        let p = Box::new(Self {
            reply,
            calls: calls.clone(),
            contexts: contexts.clone(),
        });
        (p, calls, contexts)
    }
}

impl Predictor for Scripted {
    fn predict(&self, context: &str, _: &str, _: usize) -> Result<Vec<String>, PredictorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.contexts.lock().unwrap().push(context.to_string());
        match &self.reply {
            Reply::Words(w) => Ok(w.iter().map(|s| s.to_string()).collect()),
            Reply::Timeout => Err(PredictorError::Timeout),
        }
    }
}

fn everyday() -> Arc<Dictionary> {
    Arc::new(
        Dictionary::from_entries(vec![
            DictionaryEntry::new("我", "ngo5", 3000),
            DictionaryEntry::new("想", "soeng2", 900),
            DictionaryEntry::new("的", "dik1", 5000),
            DictionaryEntry::new("了", "liu5", 150),
            DictionaryEntry::new("是", "si6", 2500),
            DictionaryEntry::new("去", "heoi3", 1200),
            DictionaryEntry::new("學校", "hok6 haau6", 800),
            DictionaryEntry::new("醫院", "ji1 jyun2", 190),
            DictionaryEntry::new("食", "sik6", 700),
            DictionaryEntry::new("飲", "jam2", 400),
            DictionaryEntry::new("你", "nei5", 2800),
            DictionaryEntry::new("呢", "ne1", 600),
            DictionaryEntry::new("拿", "naa4", 250),
            DictionaryEntry::new("尼", "nei4", 90),
            DictionaryEntry::new("牛", "ngau4", 300),
        ])
        .unwrap(),
    )
}

fn recommender(reply: Reply) -> (RelatedWordRecommender, Arc<AtomicUsize>, Arc<Mutex<Vec<String>>>) {
    let (p, calls, contexts) = Scripted::new(reply);
    let r = RelatedWordRecommender::new(everyday(), p, &JyutpingConfig::default());
    (r, calls, contexts)
}

fn texts(c: &[libjyutping::RecommendationCandidate]) -> Vec<&str> {
    c.iter().map(|c| c.hanzi.as_str()).collect()
}

/// Confirmed predictions carry dictionary data; short unknown ones become placeholders.
#[test]
fn predictions_are_confirmed_or_kept_as_placeholders() {
    let (r, calls, contexts) = recommender(Reply::Words(vec!["我想", "吃飯"]));
    let req = RecommendRequest {
        hanzi: Some("我"),
        jyutping: Some("ngo5"),
        context: None,
    };
    let out = r.recommend(req, &MatchingRule::default()).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(contexts.lock().unwrap().as_slice(), ["我"]);
    assert_eq!(texts(&out), vec!["想", "吃飯"]);
    assert_eq!(out[0].provenance, Provenance::Dictionary);
    assert_eq!(out[0].jyutping_code, "soeng2");
    assert!(out[1].is_placeholder());
    assert_eq!(out[1].frequency, 0);
}

#[test]
fn unusable_predictions_do_not_trigger_the_fallback() {
    let (r, _, _) = recommender(Reply::Words(vec!["一二三四五", "！？", "你同我", "我"]));
    let req = RecommendRequest {
        hanzi: Some("我"),
        jyutping: Some("ngo5"),
        context: Some("我想去"),
    };
    let out = r.recommend(req, &MatchingRule::default()).unwrap();
    assert!(out.is_empty(), "{out:?}");
}

/// Predictor timeout: same-initial words, follow words, then context-triggered lists.
#[test]
fn timeout_falls_back_to_heuristics() {
    let (r, calls, contexts) = recommender(Reply::Timeout);
    let req = RecommendRequest {
        hanzi: Some("我"),
        jyutping: Some("ngo5"),
        context: Some("我想去"),
    };
    let out = r.recommend(req, &MatchingRule::default()).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(contexts.lock().unwrap().as_slice(), ["我想去 我"]);
    assert_eq!(texts(&out), vec!["的", "是", "去", "學校", "食", "飲", "牛"]);
    assert!(out.iter().all(|c| c.provenance == Provenance::Heuristic));
    assert!(out.iter().all(|c| c.frequency >= 200));
}

#[test]
fn jyutping_only_request_skips_the_predictor() {
    let (r, calls, _) = recommender(Reply::Words(vec!["食飯"]));
    let req = RecommendRequest {
        hanzi: None,
        jyutping: Some("nei5"),
        context: None,
    };
    let out = r.recommend(req, &MatchingRule::default()).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    // "n" initial only: ngo5/ngau4 differ and the selected nei5 is left out
    assert_eq!(texts(&out), vec!["呢", "拿"]);
}

#[test]
fn similar_words_share_the_whole_initial() {
    let dict = Arc::new(
        Dictionary::from_entries(vec![
            DictionaryEntry::new("家", "gaa1", 900),
            DictionaryEntry::new("過", "gwo3", 1000),
            DictionaryEntry::new("高", "gou1", 800),
            DictionaryEntry::new("國", "gwok3", 700),
            DictionaryEntry::new("佢", "keoi5", 500),
            DictionaryEntry::new("今日", "gam1 jat6", 600),
        ])
        .unwrap(),
    );
    let (p, _, _) = Scripted::new(Reply::Timeout);
    let r = RelatedWordRecommender::new(dict, p, &JyutpingConfig::default());
    let req = RecommendRequest {
        jyutping: Some("gaa1"),
        ..RecommendRequest::default()
    };
    let out = r.recommend(req, &MatchingRule::default()).unwrap();
    assert_eq!(texts(&out), vec!["高", "今日"]);
}

#[test]
fn nothing_selected_means_nothing_recommended() {
    let (r, calls, _) = recommender(Reply::Words(vec!["食飯"]));
    let out = r
        .recommend(RecommendRequest::default(), &MatchingRule::default())
        .unwrap();
    assert!(out.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn placeholders_are_deduplicated_and_capped() {
    let words: Vec<&'static str> = vec![
        "甲", "乙", "丙", "丁", "戊", "己", "庚", "辛", "壬", "癸", "子", "丑", "寅", "卯", "辰",
        "巳", "午", "未", "甲", "乙",
    ];
    let (r, _, _) = recommender(Reply::Words(words));
    let req = RecommendRequest {
        hanzi: Some("我"),
        ..RecommendRequest::default()
    };
    let out = r.recommend(req, &MatchingRule::default()).unwrap();
    assert_eq!(out.len(), 15);
    let mut keys: Vec<&str> = texts(&out);
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), 15);
}

/// Empty predictor output with nothing common enough in the dictionary.
#[test]
fn empty_result_is_a_successful_answer() {
    let dict = Arc::new(
        Dictionary::from_entries(vec![
            DictionaryEntry::new("我", "ngo5", 120),
            DictionaryEntry::new("的", "dik1", 180),
        ])
        .unwrap(),
    );
    let (p, calls, _) = Scripted::new(Reply::Words(vec![]));
    let engine = Engine::new(
        dict,
        Arc::new(InMemoryRuleStore::new()),
        p,
        &JyutpingConfig::default(),
    );
    let req = RecommendRequest {
        hanzi: Some("我"),
        jyutping: Some("ngo5"),
        context: None,
    };
    let resp = engine.recommend(req, Requester::default()).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(resp.count, 0);
    assert!(resp.related_words.is_empty());
    assert_eq!(resp.hanzi, "我");
    assert_eq!(resp.jyutping, "ngo5");
}
