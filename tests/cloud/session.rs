use crate::common::*;
use feedlink::cloud::{
    Error, Invalid, Location, MAX_SUBSCRIPTIONS, Message, RetryPolicy, SessionState, TimeFormat,
};
use feedlink::network::error::Error as NetError;
use std::cell::RefCell;
use std::rc::Rc;

fn log() -> Rc<RefCell<Vec<String>>> {
    Rc::new(RefCell::new(Vec::new()))
}

fn connected() -> Harness {
    let mut h: Harness = harness();
    h.client.session().connect().unwrap();
    h
}

#[test]
fn test_publish_is_delivered_exactly_once() {
    let mut h = connected();
    h.service.borrow_mut().add_feed("temperature");
    let seen = log();

    let mut session = h.client.session();
    session.subscribe_feed("temperature", recorder(&seen)).unwrap();
    session.publish_data("temperature", "21.5", None).unwrap();

    assert_eq!(session.poll(1_000), Ok(1));
    assert_eq!(session.poll(100), Ok(0));
    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(*seen.borrow(), ["feed adabot/temperature = 21.5"]);
    assert_eq!(h.service.borrow().values("temperature"), ["21.5"]);
}

#[test]
fn test_connect_sends_credentials() {
    let h = connected();
    assert_eq!(h.client.state(), SessionState::Active);
    assert_eq!(h.service.borrow().live_links(), 1);
}

#[test]
fn test_operations_need_a_connection() {
    let mut h: Harness = harness();
    let mut session = h.client.session();

    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(session.publish("adabot/feeds/temp", b"1"), Err(Error::NotConnected));
    assert_eq!(
        session.subscribe_feed("temp", recorder(&log())),
        Err(Error::NotConnected)
    );
    assert_eq!(session.poll(100), Err(Error::NotConnected));
    assert_eq!(session.ping(), Err(Error::NotConnected));
}

#[test]
fn test_rejected_credentials_are_not_retried() {
    let config = config().with_connect_retry(RetryPolicy::Linear {
        delay_ms: 10,
        max_retry: 3,
    });
    let mut h: Harness = harness_with(config);
    h.service.borrow_mut().reject_credentials = true;

    assert_eq!(h.client.session().connect(), Err(Error::Auth));
    assert_eq!(h.client.state(), SessionState::Disconnected);
    assert_eq!(h.service.borrow().mqtt_connects, 1);
}

#[test]
fn test_connect_retries_with_backoff() {
    let config = config().with_connect_retry(RetryPolicy::Linear {
        delay_ms: 50,
        max_retry: 3,
    });
    let mut h: Harness = harness_with(config);
    h.service.borrow_mut().refuse_connects = 2;

    let started = h.clock.now();
    h.client.session().connect().unwrap();

    assert_eq!(h.service.borrow().mqtt_connects, 3);
    assert!(h.clock.now() - started >= 100);
    assert_eq!(h.client.state(), SessionState::Active);
}

#[test]
fn test_connect_gives_up_after_retries() {
    let config = config().with_connect_retry(RetryPolicy::Linear {
        delay_ms: 50,
        max_retry: 2,
    });
    let mut h: Harness = harness_with(config);
    h.service.borrow_mut().refuse_connects = 5;

    assert_eq!(
        h.client.session().connect(),
        Err(Error::Connect(NetError::ConnectionRefused))
    );
    assert_eq!(h.service.borrow().mqtt_connects, 3);
    assert_eq!(h.client.state(), SessionState::Disconnected);
}

#[test]
fn test_resubscribes_after_drop() {
    let mut h = connected();
    let seen = log();
    {
        let mut session = h.client.session();
        session.subscribe_feed("temp", recorder(&seen)).unwrap();
        session.subscribe_group("weather", recorder(&seen)).unwrap();
    }

    h.service.borrow_mut().drop_links();

    let mut session = h.client.session();
    assert_eq!(session.poll(500), Ok(0));
    assert_eq!(session.state(), SessionState::Active);

    let mut topics = h.service.borrow().subscriptions();
    topics.sort();
    assert_eq!(topics, ["adabot/feeds/temp", "adabot/groups/weather"]);
    assert_eq!(h.service.borrow().mqtt_connects, 2);

    session.publish("adabot/feeds/temp", b"7").unwrap();
    assert_eq!(session.poll(100), Ok(1));
    assert_eq!(*seen.borrow(), ["feed adabot/temp = 7"]);
}

#[test]
fn test_reconnect_gives_up_and_keeps_subscriptions() {
    let mut h = connected();
    h.client
        .session()
        .subscribe_feed("temp", recorder(&log()))
        .unwrap();
    {
        let mut service = h.service.borrow_mut();
        service.drop_links();
        service.refuse_connects = 10;
    }

    let mut session = h.client.session();
    assert!(matches!(session.poll(10_000), Err(Error::Connect(_))));
    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(session.subscriptions().collect::<Vec<_>>(), ["adabot/feeds/temp"]);
    // One attempt when the drop is noticed, then one per allowed retry.
    assert_eq!(h.service.borrow().mqtt_connects, 1 + 3);

    h.service.borrow_mut().refuse_connects = 0;
    session.connect().unwrap();
    assert_eq!(h.service.borrow().subscriptions(), ["adabot/feeds/temp"]);
}

#[test]
fn test_reconnect_waits_no_longer_than_timeout() {
    let mut h = connected();
    {
        let mut service = h.service.borrow_mut();
        service.drop_links();
        service.refuse_connects = 1;
    }

    let mut session = h.client.session();
    // First attempt fails, the next is due after 100 ms.
    assert_eq!(session.poll(20), Ok(0));
    assert!(matches!(
        session.state(),
        SessionState::Reconnecting { attempt: 2, .. }
    ));

    assert_eq!(session.poll(500), Ok(0));
    assert_eq!(session.state(), SessionState::Active);
}

#[test]
fn test_unsubscribe() {
    let mut h = connected();
    h.service.borrow_mut().add_feed("temp");
    let seen = log();

    let mut session = h.client.session();
    session.subscribe_feed("temp", recorder(&seen)).unwrap();
    session.unsubscribe_feed("temp").unwrap();
    assert!(h.service.borrow().subscriptions().is_empty());
    assert_eq!(session.unsubscribe("adabot/feeds/temp"), Err(Error::NotFound));

    session.publish_data("temp", "1", None).unwrap();
    assert_eq!(session.poll(100), Ok(0));
    assert!(seen.borrow().is_empty());
}

#[test]
fn test_refused_subscription_is_not_kept() {
    let mut h = connected();
    h.service
        .borrow_mut()
        .refused_topics
        .push("adabot/feeds/secret".into());

    let mut session = h.client.session();
    assert_eq!(
        session.subscribe_feed("secret", recorder(&log())),
        Err(Error::Auth)
    );
    assert_eq!(session.subscriptions().count(), 0);
    assert_eq!(session.state(), SessionState::Active);
}

#[test]
fn test_subscribe_validates_topics() {
    let mut h = connected();
    let mut session = h.client.session();

    assert_eq!(
        session.subscribe("not/a/topic", recorder(&log())),
        Err(Error::Validation(Invalid::Topic))
    );
    assert_eq!(
        session.subscribe("adabot/feeds/temp/csv", recorder(&log())),
        Err(Error::Validation(Invalid::Topic))
    );
    assert_eq!(
        session.subscribe_feed("bad key", recorder(&log())),
        Err(Error::Validation(Invalid::Key))
    );
    for malformed in ["adabot/throttle/bad key throttle", "adabot/errors/x!errors"] {
        assert_eq!(
            session.subscribe(malformed, recorder(&log())),
            Err(Error::Validation(Invalid::Topic))
        );
    }
    assert!(h.service.borrow().subscriptions().is_empty());
}

#[test]
fn test_hang_up_after_connack_reconnects() {
    let mut h: Harness = harness();
    h.service.borrow_mut().hang_ups = 1;
    let seen = log();
    h.client.session().connect().unwrap();

    let mut session = h.client.session();
    // The closed stream is noticed on the first read, not after keep-alive.
    assert_eq!(session.poll(1_000), Ok(0));
    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(h.service.borrow().mqtt_connects, 2);
    assert_eq!(h.service.borrow().live_links(), 1);
    assert!(h.clock.now() < 1_000);

    session.subscribe_feed("temp", recorder(&seen)).unwrap();
    session.publish("adabot/feeds/temp", b"3").unwrap();
    assert_eq!(session.poll(100), Ok(1));
    assert_eq!(*seen.borrow(), ["feed adabot/temp = 3"]);
}

#[test]
fn test_time_subscription() {
    let mut h = connected();
    let seen = log();
    let mut session = h.client.session();
    session.subscribe_time(TimeFormat::Seconds, recorder(&seen)).unwrap();
    session.subscribe_time(TimeFormat::Iso8601, recorder(&seen)).unwrap();

    h.service.borrow_mut().inject("time/seconds", b"1700000000");
    h.service
        .borrow_mut()
        .inject("time/ISO-8601", b"2023-11-14T22:13:20.000Z");
    h.service.borrow_mut().inject("time/millis", b"1700000000000");

    assert_eq!(session.poll(100), Ok(2));
    assert_eq!(
        *seen.borrow(),
        ["time seconds 1700000000", "time ISO-8601 2023-11-14T22:13:20.000Z"]
    );
    assert_eq!(
        session.publish("time/seconds", b"0"),
        Err(Error::Validation(Invalid::Topic))
    );
}

#[test]
fn test_subscription_table_is_bounded() {
    let mut h = connected();
    let mut session = h.client.session();
    for i in 0..MAX_SUBSCRIPTIONS {
        session
            .subscribe_feed(&format!("feed-{i}"), recorder(&log()))
            .unwrap();
    }
    assert_eq!(
        session.subscribe_feed("one-more", recorder(&log())),
        Err(Error::Validation(Invalid::Capacity))
    );
    // Rebinding an existing topic still works.
    session.subscribe_feed("feed-0", recorder(&log())).unwrap();
}

#[test]
fn test_throttle_notice_blocks_rest() {
    let mut h = connected();
    let seen = log();
    {
        let mut session = h.client.session();
        session.subscribe_throttle(recorder(&seen)).unwrap();
        h.service.borrow_mut().inject(
            "adabot/throttle",
            b"adabot data rate limit reached, 30 seconds until throttle released",
        );
        assert_eq!(session.poll(100), Ok(1));
    }
    assert_eq!(*seen.borrow(), ["throttle Some(30)"]);
    assert_eq!(h.client.throttle().remaining(), Some(0));

    let refused = h.client.rest().get_feed("temp");
    assert!(matches!(refused, Err(Error::Throttle { retry_after_ms }) if retry_after_ms <= 30_000));
    assert_eq!(h.service.borrow().http_connects, 0);
}

#[test]
fn test_publish_spends_shared_budget() {
    let mut h = connected();
    h.service.borrow_mut().rate = Some(Rate {
        limit: 30,
        remaining: 2,
    });
    // The GET itself uses one unit, leaving one.
    h.client.rest().rate_info().unwrap();
    assert_eq!(h.client.throttle().remaining(), Some(1));

    let mut session = h.client.session();
    session.publish("adabot/feeds/temp", b"1").unwrap();
    assert!(matches!(
        session.publish("adabot/feeds/temp", b"2"),
        Err(Error::Throttle { .. })
    ));
    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(h.service.borrow().published.len(), 1);
    assert_eq!(h.client.throttle().remaining(), Some(0));
}

#[test]
fn test_error_notices_and_shared_feeds() {
    let mut h = connected();
    let seen = log();
    let mut session = h.client.session();
    session.subscribe_errors(recorder(&seen)).unwrap();
    session
        .subscribe_shared_feed("friend", "porch", recorder(&seen))
        .unwrap();

    h.service
        .borrow_mut()
        .inject("adabot/errors", b"publish rejected: feed limit reached");
    h.service.borrow_mut().inject("friend/feeds/porch", b"5");

    assert_eq!(session.poll(100), Ok(2));
    assert_eq!(
        *seen.borrow(),
        [
            "error publish rejected: feed limit reached",
            "feed friend/porch = 5"
        ]
    );
}

#[test]
fn test_undecodable_messages_are_skipped() {
    let mut h = connected();
    let seen = log();
    let mut session = h.client.session();
    session.subscribe_group("weather", recorder(&seen)).unwrap();

    h.service.borrow_mut().inject("adabot/groups/weather", b"not json");
    h.service
        .borrow_mut()
        .inject("adabot/groups/weather", br#"{"feeds":{"temp":"20"}}"#);

    assert_eq!(session.poll(100), Ok(1));
    assert_eq!(*seen.borrow(), ["group weather: temp=20"]);
}

#[test]
fn test_group_publish() {
    let mut h = connected();
    let seen = log();
    let mut session = h.client.session();
    session.subscribe_group("weather", recorder(&seen)).unwrap();

    session
        .publish_group("weather", &[("humidity", "40"), ("temp", "20")])
        .unwrap();
    assert_eq!(session.poll(100), Ok(1));
    assert_eq!(*seen.borrow(), ["group weather: humidity=40 temp=20"]);

    assert_eq!(
        session.publish_group("weather", &[]),
        Err(Error::Validation(Invalid::Count))
    );
}

#[test]
fn test_located_publish_uses_csv_topic() {
    let mut h = connected();
    let mut session = h.client.session();

    session
        .publish_data("gps", "12", Some(Location::new(40.5, -74.0)))
        .unwrap();
    session
        .publish_data("gps", "13", Some(Location::new(40.5, -74.0).with_elevation(10.0)))
        .unwrap();
    assert_eq!(
        session.publish_data("gps", "1,2", Some(Location::new(0.0, 0.0))),
        Err(Error::Validation(Invalid::Value))
    );

    let service = h.service.borrow();
    let (topic, payload) = &service.published[0];
    assert_eq!(topic, "adabot/feeds/gps/csv");
    assert_eq!(payload.as_slice(), b"12,40.5,-74");
    assert_eq!(service.published[1].1.as_slice(), b"13,40.5,-74,10");
    assert_eq!(service.published.len(), 2);
}

#[test]
fn test_request_last_value() {
    let mut h = connected();
    h.service.borrow_mut().add_feed("temp");
    h.client.rest().send_data("temp", "7", None, None).unwrap();
    let seen = log();

    let mut session = h.client.session();
    session.subscribe_feed("temp", recorder(&seen)).unwrap();
    session.request_last_value("temp").unwrap();

    assert_eq!(session.poll(100), Ok(1));
    assert_eq!(*seen.borrow(), ["feed adabot/temp = 7"]);
}

#[test]
fn test_messages_arriving_during_subscribe_are_held() {
    let mut h = connected();
    let seen = log();
    let mut session = h.client.session();
    session.subscribe_feed("temp", recorder(&seen)).unwrap();

    h.service.borrow_mut().inject("adabot/feeds/temp", b"1");
    session.subscribe_feed("other", recorder(&seen)).unwrap();

    assert_eq!(session.poll(100), Ok(1));
    assert_eq!(*seen.borrow(), ["feed adabot/temp = 1"]);
}

#[test]
fn test_publish_validation() {
    let mut h = connected();
    let mut session = h.client.session();

    assert_eq!(
        session.publish("adabot/feeds/temp", b""),
        Err(Error::Validation(Invalid::Value))
    );
    assert_eq!(
        session.publish("adabot/throttle", b"1"),
        Err(Error::Validation(Invalid::Topic))
    );
    assert_eq!(
        session.publish("no-such-scheme", b"1"),
        Err(Error::Validation(Invalid::Topic))
    );
    assert!(h.service.borrow().published.is_empty());
}

#[test]
fn test_keep_alive() {
    let mut h = connected();

    h.clock.advance(8_000);
    assert_eq!(h.client.session().poll(0), Ok(0));
    assert_eq!(h.service.borrow().pings, 1);

    h.service.borrow_mut().mute_pings = true;
    h.clock.advance(8_000);
    assert_eq!(h.client.session().poll(0), Ok(0));
    assert_eq!(h.service.borrow().pings, 2);

    // No PINGRESP for a full interval: the link is presumed dead.
    h.clock.advance(11_000);
    assert_eq!(h.client.session().poll(100), Ok(0));
    assert_eq!(h.client.state(), SessionState::Active);
    assert_eq!(h.service.borrow().mqtt_connects, 2);
    assert_eq!(h.service.borrow().live_links(), 1);
}

#[test]
fn test_disconnect_keeps_subscriptions() {
    let mut h = connected();
    let mut session = h.client.session();
    session.subscribe_feed("temp", recorder(&log())).unwrap();

    session.disconnect().unwrap();
    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(session.poll(100), Err(Error::NotConnected));
    assert_eq!(h.service.borrow().disconnects, 1);
    assert_eq!(h.service.borrow().live_links(), 0);

    session.connect().unwrap();
    assert_eq!(h.service.borrow().subscriptions(), ["adabot/feeds/temp"]);
}

#[test]
fn test_plain_function_handlers() {
    fn ignore(_: &Message<'_>) {}

    let mut h: Harness<fn(&Message<'_>)> = harness();
    let mut session = h.client.session();
    session.connect().unwrap();
    session.subscribe_feed("temp", ignore).unwrap();
    session.subscribe_feed("other", |_| {}).unwrap();

    session.publish("adabot/feeds/temp", b"1").unwrap();
    assert_eq!(session.poll(100), Ok(1));
}
