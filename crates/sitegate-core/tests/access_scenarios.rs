//! End-to-end controller scenarios on a virtual clock.
//!
//! Each test drives a [`Controller`] through host events and due wakeups the
//! way the browser host would, then checks commands, events and the store.

use chrono::{DateTime, Duration, TimeZone, Utc};
use sitegate_core::{
    AllowanceStore, Catalog, Controller, Database, Event, HostEvent, MemoryStore, Message,
    PauseReason, Reply, SiteEntry, SiteRef, StoredState, TimerState, GRANT_SECS,
};

const BLOCK_PAGE: &str = "block.html";

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

fn at(secs: i64) -> DateTime<Utc> {
    t0() + Duration::seconds(secs)
}

/// Controller over a store where `allowances` are preset.
fn controller_with(allowances: &[(&str, usize, u64)]) -> Controller<MemoryStore> {
    let mut state = StoredState::default();
    for (category, index, secs) in allowances {
        state
            .catalog
            .get_mut(&SiteRef::new(*category, *index))
            .unwrap()
            .time_remaining = *secs;
    }
    Controller::new(MemoryStore::with_state(state), BLOCK_PAGE, t0()).unwrap()
}

fn remaining(controller: &Controller<MemoryStore>, category: &str, index: usize) -> u64 {
    controller
        .store()
        .load()
        .unwrap()
        .catalog
        .get(&SiteRef::new(category, index))
        .unwrap()
        .time_remaining
}

fn navigate(tab: u64, url: &str) -> HostEvent {
    HostEvent::NavigationCompleted {
        tab_id: tab,
        url: url.to_string(),
    }
}

fn activate(tab: u64, url: &str) -> HostEvent {
    HostEvent::TabActivated {
        tab_id: tab,
        url: url.to_string(),
    }
}

fn message(tab: u64, tab_url: Option<&str>, message: Message) -> HostEvent {
    HostEvent::Message {
        tab_id: tab,
        tab_url: tab_url.map(str::to_string),
        request_id: Some(1),
        message,
    }
}

/// Advance one second at a time from `from` (exclusive) to `to` (inclusive).
fn run_clock(
    controller: &mut Controller<MemoryStore>,
    from: i64,
    to: i64,
) -> Vec<sitegate_core::Outcome> {
    ((from + 1)..=to)
        .map(|s| controller.advance(at(s)))
        .filter(|out| !out.is_empty())
        .collect()
}

#[test]
fn fresh_install_writes_defaults() {
    let controller = Controller::new(Database::open_memory().unwrap(), BLOCK_PAGE, t0()).unwrap();
    let state = controller.store().load().unwrap();
    assert!(state.enabled);
    assert_eq!(state.catalog, Catalog::default_catalog());
    assert!(controller.store().is_installed().unwrap());
}

#[test]
fn exhausted_site_redirects_to_block_page() {
    let mut controller = controller_with(&[]);
    let out = controller.dispatch(navigate(7, "https://www.facebook.com/"), t0());
    assert_eq!(
        out.navigations(),
        vec![(7, "block.html?domain=facebook.com&category=socialMedia&index=0")]
    );
    assert_eq!(
        controller.tab_url(7),
        Some("block.html?domain=facebook.com&category=socialMedia&index=0")
    );
    assert!(controller.timers().is_empty());
}

#[test]
fn allowance_counts_down_to_block() {
    let mut controller = controller_with(&[("shopping", 0, 30)]);
    let out = controller.dispatch(navigate(1, "https://amazon.in/deals"), t0());
    assert!(out.navigations().is_empty());
    assert!(matches!(
        out.events.as_slice(),
        [Event::TimerStarted { remaining_secs: 30, .. }]
    ));

    let outcomes = run_clock(&mut controller, 0, 29);
    assert!(outcomes.iter().all(|o| o.navigations().is_empty()));
    assert_eq!(remaining(&controller, "shopping", 0), 1);

    let out = controller.advance(at(30));
    assert_eq!(remaining(&controller, "shopping", 0), 0);
    assert_eq!(controller.store().catalog_writes(), 30);
    assert_eq!(
        out.navigations(),
        vec![(1, "block.html?domain=amazon.in&category=shopping&index=0")]
    );
    assert!(out
        .events
        .iter()
        .any(|e| matches!(e, Event::AllowanceExpired { index: 0, .. })));
    assert!(controller.timers().get("amazon.in").is_none());

    // Nothing keeps ticking after expiry.
    assert!(run_clock(&mut controller, 30, 40).is_empty());
    assert_eq!(controller.store().catalog_writes(), 30);
    assert_eq!(remaining(&controller, "shopping", 0), 0);
}

#[test]
fn unblock_grants_and_returns_to_site() {
    let mut controller = controller_with(&[]);
    let out = controller.dispatch(
        message(
            3,
            Some("block.html?domain=facebook.com&category=socialMedia&index=0"),
            Message::UnblockSite {
                domain: "facebook.com".into(),
                category: "socialMedia".into(),
                index: 0,
            },
        ),
        t0(),
    );
    assert_eq!(out.reply(), Some(Reply::Unblock { success: true }));
    assert_eq!(out.navigations(), vec![(3, "https://facebook.com")]);
    assert_eq!(remaining(&controller, "socialMedia", 0), GRANT_SECS);

    // The host reports the navigation back; the site is now allowed.
    let out = controller.dispatch(navigate(3, "https://facebook.com/"), at(1));
    assert!(out.navigations().is_empty());
    assert!(controller.timers().get("facebook.com").is_some());
}

#[test]
fn unblock_overwrites_remaining_allowance() {
    for before in [0, 1, 899, 900, 5000] {
        let mut controller = controller_with(&[("ott", 0, before)]);
        let out = controller.dispatch(
            message(
                1,
                None,
                Message::UnblockSite {
                    domain: "netflix.com".into(),
                    category: "ott".into(),
                    index: 0,
                },
            ),
            t0(),
        );
        assert_eq!(out.reply(), Some(Reply::Unblock { success: true }));
        assert_eq!(remaining(&controller, "ott", 0), GRANT_SECS);
    }
}

#[test]
fn unblock_of_unknown_site_fails_softly() {
    let mut controller = controller_with(&[]);
    let out = controller.dispatch(
        message(
            1,
            None,
            Message::UnblockSite {
                domain: "news.example".into(),
                category: "news".into(),
                index: 0,
            },
        ),
        t0(),
    );
    assert_eq!(out.reply(), Some(Reply::Unblock { success: false }));
    assert!(out.navigations().is_empty());
}

#[test]
fn activation_pauses_other_tab_first() {
    let mut controller = controller_with(&[("shopping", 0, 600), ("socialMedia", 1, 600)]);
    controller.dispatch(navigate(1, "https://amazon.in/"), t0());
    controller.dispatch(navigate(2, "https://x.com/home"), t0());
    assert_eq!(controller.timers().running(), vec!["amazon.in", "x.com"]);

    let out = controller.dispatch(activate(2, "https://x.com/home"), t0());
    assert_eq!(
        out.events,
        vec![Event::TimerPaused {
            site: "amazon.in".into(),
            reason: PauseReason::TabSwitch,
            at: t0(),
        }]
    );
    assert_eq!(controller.timers().running(), vec!["x.com"]);

    run_clock(&mut controller, 0, 5);
    assert_eq!(remaining(&controller, "shopping", 0), 600);
    assert_eq!(remaining(&controller, "socialMedia", 1), 595);

    // Back to tab 1: x.com stops, amazon.in picks up where it left off.
    controller.dispatch(activate(1, "https://amazon.in/"), at(5));
    assert_eq!(controller.timers().running(), vec!["amazon.in"]);
    run_clock(&mut controller, 5, 8);
    assert_eq!(remaining(&controller, "shopping", 0), 597);
    assert_eq!(remaining(&controller, "socialMedia", 1), 595);
}

#[test]
fn activation_of_untracked_tab_pauses_everything() {
    let mut controller = controller_with(&[("shopping", 0, 600)]);
    controller.dispatch(navigate(1, "https://amazon.in/"), t0());
    controller.dispatch(activate(2, "https://docs.rs/"), at(1));
    assert!(controller.timers().running().is_empty());
    assert_eq!(controller.timers().len(), 1);
}

#[test]
fn closing_tab_keeps_accounting() {
    let mut controller = controller_with(&[("shopping", 1, 100)]);
    controller.dispatch(navigate(1, "https://www.flipkart.com/"), t0());
    run_clock(&mut controller, 0, 10);
    assert_eq!(remaining(&controller, "shopping", 1), 90);

    controller.dispatch(HostEvent::TabRemoved { tab_id: 1 }, at(10));
    let timer = controller.timers().get("flipkart.com").unwrap();
    assert_eq!(timer.state, TimerState::Paused);
    run_clock(&mut controller, 10, 20);
    assert_eq!(remaining(&controller, "shopping", 1), 90);

    controller.dispatch(activate(4, "https://flipkart.com/cart"), at(20));
    let timer = controller.timers().get("flipkart.com").unwrap();
    assert_eq!(timer.state, TimerState::Running);
    assert_eq!(timer.owner_tab, 4);
    run_clock(&mut controller, 20, 22);
    assert_eq!(remaining(&controller, "shopping", 1), 88);
}

#[test]
fn navigating_away_pauses_the_tabs_timer() {
    let mut controller = controller_with(&[("shopping", 2, 100)]);
    controller.dispatch(navigate(1, "https://myntra.com/"), t0());
    run_clock(&mut controller, 0, 3);
    let out = controller.dispatch(navigate(1, "https://docs.rs/"), at(3));
    assert!(out.events.iter().any(|e| matches!(
        e,
        Event::TimerPaused {
            reason: PauseReason::NavigatedAway,
            ..
        }
    )));
    run_clock(&mut controller, 3, 10);
    assert_eq!(remaining(&controller, "shopping", 2), 97);
}

#[test]
fn inactivity_and_hidden_pause_until_activity() {
    let mut controller = controller_with(&[("ott", 0, 300)]);
    controller.dispatch(navigate(1, "https://www.netflix.com/browse"), t0());
    // netflix.com also contains "x.com"; the X entry is first and has no
    // allowance, so the navigation is blocked.
    assert!(controller.timers().is_empty());

    let mut controller = controller_with(&[("ott", 2, 300)]);
    controller.dispatch(navigate(1, "https://primevideo.com/"), t0());
    run_clock(&mut controller, 0, 2);

    let out = controller.dispatch(message(1, None, Message::InactivityNotification), at(2));
    assert_eq!(out.reply(), Some(Reply::Ack { received: true }));
    run_clock(&mut controller, 2, 12);
    assert_eq!(remaining(&controller, "ott", 2), 298);

    let out = controller.dispatch(
        message(
            1,
            None,
            Message::ActivityPing {
                url: "https://primevideo.com/detail".into(),
            },
        ),
        at(12),
    );
    assert!(out
        .events
        .iter()
        .any(|e| matches!(e, Event::TimerResumed { tab_id: 1, .. })));
    run_clock(&mut controller, 12, 14);
    assert_eq!(remaining(&controller, "ott", 2), 296);

    controller.dispatch(message(1, None, Message::TabHidden), at(14));
    run_clock(&mut controller, 14, 20);
    assert_eq!(remaining(&controller, "ott", 2), 296);

    controller.dispatch(
        message(
            1,
            None,
            Message::TabVisible {
                url: "https://primevideo.com/detail".into(),
            },
        ),
        at(20),
    );
    run_clock(&mut controller, 20, 21);
    assert_eq!(remaining(&controller, "ott", 2), 295);
}

#[test]
fn messages_without_timers_are_acknowledged() {
    let mut controller = controller_with(&[]);
    for msg in [
        Message::ActivityPing {
            url: "https://docs.rs/".into(),
        },
        Message::ActivityPing {
            url: "not a url".into(),
        },
        Message::InactivityNotification,
        Message::TabHidden,
        Message::TabVisible {
            url: "https://x.com/".into(),
        },
    ] {
        let out = controller.dispatch(message(9, None, msg), t0());
        assert_eq!(out.reply(), Some(Reply::Ack { received: true }));
        assert!(out.events.is_empty());
    }
}

#[test]
fn watchdog_pauses_silent_timer_and_activation_resumes() {
    let mut controller = controller_with(&[("shopping", 0, GRANT_SECS)]);
    controller.dispatch(navigate(1, "https://amazon.in/"), t0());

    // Six minutes with no activity signal at all.
    let outcomes = run_clock(&mut controller, 0, 400);
    let watchdog_pauses = outcomes
        .iter()
        .flat_map(|o| o.events.iter())
        .filter(|e| {
            matches!(
                e,
                Event::TimerPaused {
                    reason: PauseReason::Watchdog,
                    ..
                }
            )
        })
        .count();
    assert_eq!(watchdog_pauses, 1);
    assert_eq!(
        controller.timers().get("amazon.in").unwrap().state,
        TimerState::Paused
    );
    // Ticks 1..=359 landed; the sweep at 360 beat the tick due at the same instant.
    assert_eq!(remaining(&controller, "shopping", 0), GRANT_SECS - 359);

    controller.dispatch(activate(1, "https://amazon.in/"), at(400));
    run_clock(&mut controller, 400, 410);
    assert_eq!(remaining(&controller, "shopping", 0), GRANT_SECS - 369);
}

#[test]
fn pings_keep_watchdog_away() {
    let mut controller = controller_with(&[("shopping", 0, GRANT_SECS)]);
    controller.dispatch(navigate(1, "https://amazon.in/"), t0());
    for s in 1..=400 {
        if s % 5 == 0 {
            controller.dispatch(
                message(
                    1,
                    None,
                    Message::ActivityPing {
                        url: "https://amazon.in/".into(),
                    },
                ),
                at(s),
            );
        }
        controller.advance(at(s));
    }
    assert_eq!(remaining(&controller, "shopping", 0), GRANT_SECS - 400);
}

#[test]
fn grant_during_countdown_is_not_lost() {
    let mut controller = controller_with(&[("socialMedia", 2, 10)]);
    controller.dispatch(navigate(1, "https://instagram.com/"), t0());
    run_clock(&mut controller, 0, 5);
    assert_eq!(remaining(&controller, "socialMedia", 2), 5);

    controller
        .grant(&SiteRef::new("socialMedia", 2), at(5))
        .unwrap();
    run_clock(&mut controller, 5, 6);
    assert_eq!(remaining(&controller, "socialMedia", 2), GRANT_SECS - 1);
}

#[test]
fn disabled_controller_does_not_block() {
    let mut controller = controller_with(&[]);
    controller.set_enabled(false, t0()).unwrap();
    let out = controller.dispatch(navigate(1, "https://facebook.com/"), t0());
    assert!(out.is_empty());
}

#[test]
fn expiry_while_disabled_skips_redirect() {
    let mut controller = controller_with(&[("socialMedia", 3, 2)]);
    controller.dispatch(navigate(1, "https://linkedin.com/feed"), t0());
    controller.set_enabled(false, t0()).unwrap();
    let outcomes = run_clock(&mut controller, 0, 2);
    assert!(outcomes.iter().all(|o| o.navigations().is_empty()));
    assert_eq!(remaining(&controller, "socialMedia", 3), 0);
    assert!(controller.timers().is_empty());
}

#[test]
fn expiry_redirects_every_tab_on_the_site() {
    let mut controller = controller_with(&[("shopping", 4, 3)]);
    controller.dispatch(navigate(1, "https://ebay.com/"), t0());
    controller.dispatch(navigate(2, "https://www.ebay.com/itm/1"), t0());
    controller.dispatch(navigate(3, "https://docs.rs/"), t0());
    let outcomes = run_clock(&mut controller, 0, 3);
    let navigations: Vec<(u64, String)> = outcomes
        .iter()
        .flat_map(|o| o.navigations())
        .map(|(tab, url)| (tab, url.to_string()))
        .collect();
    assert_eq!(
        navigations,
        vec![
            (1, "block.html?domain=ebay.com&category=shopping&index=4".to_string()),
            (2, "block.html?domain=ebay.com&category=shopping&index=4".to_string()),
        ]
    );
}

#[test]
fn shorts_timer_is_separate_from_youtube() {
    let mut controller = controller_with(&[("ott", 1, 60)]);
    controller.dispatch(navigate(1, "https://www.youtube.com/shorts/abc"), t0());
    assert!(controller.timers().get("youtube.com/shorts").is_some());

    // Regular YouTube is not tracked at all, so the Shorts timer stops.
    let out = controller.dispatch(navigate(1, "https://youtube.com/watch?v=x"), at(1));
    assert!(out.navigations().is_empty());
    assert_eq!(
        controller.timers().get("youtube.com/shorts").unwrap().state,
        TimerState::Paused
    );
}

#[test]
fn repeated_navigation_keeps_one_tick_loop() {
    let mut controller = controller_with(&[("shopping", 5, 100)]);
    for s in 0..5 {
        controller.dispatch(navigate(1, "https://walmart.com/"), at(s));
        controller.dispatch(navigate(2, "https://walmart.com/"), at(s));
    }
    assert_eq!(controller.timers().len(), 1);
    // The first due tick lands late and is not replayed.
    run_clock(&mut controller, 4, 14);
    assert_eq!(remaining(&controller, "shopping", 5), 90);
}

#[test]
fn malformed_urls_are_ignored() {
    let mut controller = controller_with(&[]);
    for url in ["", "::::", "chrome://newtab", "block.html?domain=x.com"] {
        let out = controller.dispatch(navigate(1, url), t0());
        assert!(out.navigations().is_empty(), "{url}");
    }
}

#[test]
fn navigating_away_while_disabled_pauses() {
    let mut controller = controller_with(&[("shopping", 0, 100)]);
    controller.dispatch(navigate(1, "https://amazon.in/"), t0());
    controller.set_enabled(false, t0()).unwrap();

    let out = controller.dispatch(navigate(1, "https://docs.rs/"), t0());
    assert!(out.navigations().is_empty());
    assert!(controller.timers().running().is_empty());
    run_clock(&mut controller, 0, 10);
    assert_eq!(remaining(&controller, "shopping", 0), 100);
}

#[test]
fn replaced_entry_drops_live_timer() {
    let mut controller = controller_with(&[("shopping", 0, 100)]);
    controller.dispatch(navigate(1, "https://amazon.in/"), t0());
    run_clock(&mut controller, 0, 2);
    assert_eq!(remaining(&controller, "shopping", 0), 98);

    let mut catalog = controller.store().load().unwrap().catalog;
    let mut replacement = SiteEntry::new("bestbuy.com", "Best Buy");
    replacement.time_remaining = 50;
    catalog.push_category("shopping", vec![replacement]);
    controller.store_mut().save_catalog(&catalog).unwrap();

    let outcomes = run_clock(&mut controller, 2, 5);
    assert!(outcomes.iter().all(|o| o.navigations().is_empty()));
    assert!(controller.timers().get("amazon.in").is_none());
    assert_eq!(remaining(&controller, "shopping", 0), 50);
}

#[test]
fn removed_category_drops_live_timer() {
    let mut controller = controller_with(&[("ott", 2, 100)]);
    controller.dispatch(navigate(1, "https://primevideo.com/"), t0());

    let mut catalog = Catalog::new();
    catalog.push_category("socialMedia", vec![SiteEntry::new("facebook.com", "Facebook")]);
    controller.store_mut().save_catalog(&catalog).unwrap();

    run_clock(&mut controller, 0, 3);
    assert!(controller.timers().is_empty());
    let stored = controller.store().load().unwrap().catalog;
    assert_eq!(stored, catalog);
}
