use crate::common::*;
use feedlink::cloud::{BatchPoint, Config, Error, Invalid, Location, MAX_DATA_POINTS, MAX_GROUP_FEEDS};

#[test]
fn test_create_then_get_feed() {
    let mut h: Harness = harness();

    let created = h.client.rest().create_feed("temperature", Some("porch")).unwrap();
    assert_eq!(created.key.as_str(), "temperature");

    let fetched = h.client.rest().get_feed("temperature").unwrap();
    assert_eq!(fetched.key, created.key);
    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.last_value, None);
}

#[test]
fn test_get_or_create_creates_once() {
    let mut h: Harness = harness();

    h.client.rest().get_or_create_feed("humidity", None).unwrap();
    h.client.rest().get_or_create_feed("humidity", None).unwrap();

    let service = h.service.borrow();
    let posts = service.requests.iter().filter(|r| r.starts_with("POST")).count();
    assert_eq!(posts, 1);
    assert!(service.feeds.contains_key("humidity"));
}

#[test]
fn test_get_or_create_checks_name_before_any_request() {
    let mut h: Harness = harness();

    for key in ["Humidity", "weather.humidity"] {
        assert_eq!(
            h.client.rest().get_or_create_feed(key, None).err(),
            Some(Error::Validation(Invalid::Name))
        );
    }
    assert_eq!(h.service.borrow().http_connects, 0);
    assert_eq!(h.client.throttle().remaining(), None);
}

#[test]
fn test_send_then_receive() {
    let mut h: Harness = harness();
    h.service.borrow_mut().add_feed("temp");

    let sent = h.client.rest().send_data("temp", "21.5", None, None).unwrap();
    assert_eq!(sent.value.as_str(), "21.5");
    assert!(sent.id.is_some());

    let last = h.client.rest().receive_data("temp").unwrap();
    assert_eq!(last.value.as_str(), "21.5");
    assert_eq!(last.id, sent.id);
    assert_eq!(last.feed_key.as_deref(), Some("temp"));
}

#[test]
fn test_receive_n_is_newest_first() {
    let mut h: Harness = harness();
    h.service.borrow_mut().add_feed("temp");
    for value in ["1", "2", "3"] {
        h.client.rest().send_data("temp", value, None, None).unwrap();
    }

    let points = h.client.rest().receive_n_data("temp", 2).unwrap();
    let values: Vec<&str> = points.iter().map(|p| p.value.as_str()).collect();
    assert_eq!(values, ["3", "2"]);

    assert_eq!(
        h.client.rest().receive_n_data("temp", 0).err(),
        Some(Error::Validation(Invalid::Count))
    );
}

#[test]
fn test_send_with_location() {
    let mut h: Harness = harness();
    h.service.borrow_mut().add_feed("gps");

    let point = h
        .client
        .rest()
        .send_data("gps", "12", None, Some(Location::new(40.5, -74.0)))
        .unwrap();
    assert_eq!(point.location, Some(Location::new(40.5, -74.0)));
}

#[test]
fn test_location_survives_at_full_precision() {
    let mut h: Harness = harness();
    h.service.borrow_mut().add_feed("gps");

    let here = Location::new(40.726190, -74.005334);
    let point = h.client.rest().send_data("gps", "1", None, Some(here)).unwrap();
    assert_eq!(point.location, Some(here));
}

#[test]
fn test_batch_send() {
    let mut h: Harness = harness();
    h.service.borrow_mut().add_feed("temp");

    let points = [
        BatchPoint::new("1"),
        BatchPoint::new("2").at(Location::new(40.5, -74.0)),
        BatchPoint::new("3"),
    ];
    let created = h.client.rest().send_batch_data("temp", &points).unwrap();
    let values: Vec<&str> = created.iter().map(|p| p.value.as_str()).collect();
    assert_eq!(values, ["1", "2", "3"]);
    assert_eq!(created[1].location, Some(Location::new(40.5, -74.0)));
    assert_eq!(h.service.borrow().values("temp"), ["1", "2", "3"]);
    assert_eq!(
        h.service.borrow().requests.last().map(String::as_str),
        Some("POST /api/v2/adabot/feeds/temp/data/batch")
    );
}

#[test]
fn test_batch_send_validates_every_point() {
    let mut h: Harness = harness();
    h.service.borrow_mut().add_feed("temp");

    assert_eq!(
        h.client.rest().send_batch_data("temp", &[]).err(),
        Some(Error::Validation(Invalid::Count))
    );
    let too_many = [BatchPoint::new("1"); MAX_DATA_POINTS + 1];
    assert_eq!(
        h.client.rest().send_batch_data("temp", &too_many).err(),
        Some(Error::Validation(Invalid::Count))
    );
    assert_eq!(
        h.client
            .rest()
            .send_batch_data("temp", &[BatchPoint::new("1"), BatchPoint::new("")])
            .err(),
        Some(Error::Validation(Invalid::Value))
    );
    assert_eq!(h.service.borrow().http_connects, 0);
}

#[test]
fn test_receive_all_is_bounded() {
    let mut h: Harness = harness();
    h.service.borrow_mut().add_feed("temp");
    let values: Vec<String> = (0..MAX_DATA_POINTS + 2).map(|i| i.to_string()).collect();
    for value in &values {
        h.client.rest().send_data("temp", value, None, None).unwrap();
    }

    let points = h.client.rest().receive_all_data("temp").unwrap();
    assert_eq!(points.len(), MAX_DATA_POINTS);
    assert_eq!(points[0].value.as_str(), values.last().unwrap().as_str());
}

#[test]
fn test_user_info() {
    let mut h: Harness = harness();
    let user = h.client.rest().user_info().unwrap();
    assert_eq!(user.username.as_str(), USER);
    assert_eq!(user.id, Some(7));
    assert_eq!(
        h.service.borrow().requests.last().map(String::as_str),
        Some("GET /api/v2/user")
    );
}

#[test]
fn test_send_to_missing_feed_is_not_found() {
    let mut h: Harness = harness();
    assert_eq!(
        h.client.rest().send_data("nope", "1", None, None).err(),
        Some(Error::NotFound)
    );
}

#[test]
fn test_receive_from_empty_feed_is_not_found() {
    let mut h: Harness = harness();
    h.service.borrow_mut().add_feed("empty");
    assert_eq!(h.client.rest().receive_data("empty").err(), Some(Error::NotFound));
}

#[test]
fn test_delete_data_and_feed() {
    let mut h: Harness = harness();
    h.service.borrow_mut().add_feed("temp");
    let first = h.client.rest().send_data("temp", "1", None, None).unwrap();
    h.client.rest().send_data("temp", "2", None, None).unwrap();

    let id = first.id.unwrap();
    h.client.rest().delete_data("temp", &id).unwrap();
    assert_eq!(h.service.borrow().values("temp"), ["2"]);
    assert_eq!(h.client.rest().delete_data("temp", &id).err(), Some(Error::NotFound));

    h.client.rest().delete_feed("temp").unwrap();
    assert_eq!(h.client.rest().get_feed("temp").err(), Some(Error::NotFound));
}

#[test]
fn test_wrong_key_is_auth_error() {
    let config = Config::new(USER, "not-the-key").unwrap();
    let mut h: Harness = harness_with(config);
    h.service.borrow_mut().add_feed("temp");

    assert_eq!(h.client.rest().get_feed("temp").err(), Some(Error::Auth));
}

#[test]
fn test_invalid_input_never_reaches_service() {
    let mut h: Harness = harness();

    assert_eq!(
        h.client.rest().get_feed("has space").err(),
        Some(Error::Validation(Invalid::Key))
    );
    assert_eq!(
        h.client.rest().create_feed("Upper", None).err(),
        Some(Error::Validation(Invalid::Name))
    );
    assert_eq!(
        h.client.rest().send_data("temp", "", None, None).err(),
        Some(Error::Validation(Invalid::Value))
    );
    assert_eq!(h.service.borrow().http_connects, 0);
    assert_eq!(h.client.throttle().remaining(), None);
}

#[test]
fn test_every_request_uses_its_own_connection() {
    let mut h: Harness = harness();
    h.service.borrow_mut().add_feed("temp");
    h.client.rest().get_feed("temp").unwrap();
    h.client.rest().send_data("temp", "1", None, None).unwrap();
    let _ = h.client.rest().get_feed("missing");

    let service = h.service.borrow();
    assert_eq!(service.http_connects, 3);
    assert_eq!(service.requests.len(), 3);
}

#[test]
fn test_exhausted_budget_fails_without_network() {
    let mut h: Harness = harness();
    {
        let mut service = h.service.borrow_mut();
        service.add_feed("temp");
        service.rate = Some(Rate {
            limit: 30,
            remaining: 3,
        });
    }

    for value in ["1", "2", "3"] {
        h.client.rest().send_data("temp", value, None, None).unwrap();
    }
    assert_eq!(h.client.throttle().remaining(), Some(0));

    let refused = h.client.rest().send_data("temp", "4", None, None);
    assert!(matches!(refused, Err(Error::Throttle { retry_after_ms }) if retry_after_ms > 0));
    assert_eq!(h.service.borrow().http_connects, 3);
    assert_eq!(h.service.borrow().values("temp"), ["1", "2", "3"]);
}

#[test]
fn test_unpredicted_rejection_resyncs_budget() {
    let mut h: Harness = harness();
    {
        let mut service = h.service.borrow_mut();
        service.add_feed("temp");
        service.rate = Some(Rate {
            limit: 30,
            remaining: 0,
        });
    }

    let rejected = h.client.rest().send_data("temp", "1", None, None);
    assert!(matches!(
        rejected,
        Err(Error::Throttle { retry_after_ms }) if retry_after_ms > 29_000 && retry_after_ms <= 30_000
    ));

    // Known to be over the limit now: no second round trip.
    assert!(h.client.rest().get_feed("temp").is_err());
    assert_eq!(h.service.borrow().http_connects, 1);

    h.service.borrow_mut().rate = None;
    h.clock.advance(31_000);
    assert!(h.client.rest().get_feed("temp").is_ok());
}

#[test]
fn test_rate_info_seeds_tracker() {
    let mut h: Harness = harness();
    h.service.borrow_mut().rate = Some(Rate {
        limit: 30,
        remaining: 10,
    });

    let info = h.client.rest().rate_info().unwrap();
    assert_eq!(info.data_rate_limit, 30);
    assert_eq!(info.remaining(), 9);
    assert_eq!(h.client.throttle().remaining(), Some(9));
    assert_eq!(h.client.throttle().limit(), Some(30));
}

#[test]
fn test_groups() {
    let mut h: Harness = harness();
    h.service.borrow_mut().add_feed("temp");

    let group = h.client.rest().create_group("weather", None).unwrap();
    assert_eq!(group.key.as_str(), "weather");
    assert!(group.feeds.is_empty());

    let humidity = h.client.rest().create_feed_in_group("weather", "humidity").unwrap();
    assert_eq!(humidity.key.as_str(), "weather.humidity");
    h.client.rest().add_feed_to_group("weather", "temp").unwrap();

    let group = h.client.rest().get_group("weather").unwrap();
    let members: Vec<&str> = group.feeds.iter().map(|k| k.as_str()).collect();
    assert_eq!(members, ["weather.humidity", "temp"]);

    h.client
        .rest()
        .send_group_data("weather", &[("humidity", "40"), ("temp", "20")], None)
        .unwrap();
    assert_eq!(h.service.borrow().values("weather.humidity"), ["40"]);
    assert_eq!(h.service.borrow().values("temp"), ["20"]);

    assert_eq!(
        h.client.rest().add_feed_to_group("weather", "missing").err(),
        Some(Error::NotFound)
    );

    h.client.rest().delete_group("weather").unwrap();
    assert_eq!(h.client.rest().get_group("weather").err(), Some(Error::NotFound));
    // Member feeds outlive the group.
    assert!(h.client.rest().get_feed("temp").is_ok());
}

#[test]
fn test_large_group_keeps_first_members() {
    let mut h: Harness = harness();
    h.client.rest().create_group("big", None).unwrap();
    for i in 0..MAX_GROUP_FEEDS + 2 {
        h.client
            .rest()
            .create_feed_in_group("big", &format!("f{i}"))
            .unwrap();
    }

    let group = h.client.rest().get_group("big").unwrap();
    assert_eq!(group.feeds.len(), MAX_GROUP_FEEDS);
    assert_eq!(group.feeds[0].as_str(), "big.f0");
}

#[test]
fn test_duplicate_create_is_rejected() {
    let mut h: Harness = harness();
    h.client.rest().create_group("weather", None).unwrap();
    assert_eq!(
        h.client.rest().create_group("weather", None).err(),
        Some(Error::Validation(Invalid::Rejected(400)))
    );
}
