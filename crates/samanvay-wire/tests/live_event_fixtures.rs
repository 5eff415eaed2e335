use samanvay_wire::{decode_live_frame, LiveEvent, LiveEventKind, WireError};

#[test]
fn backend_fixtures_decode_to_expected_kinds() {
    let fixtures: &[(&[u8], LiveEventKind)] = &[
        (br#"{"event":"connect","data":null}"#, LiveEventKind::Connect),
        (br#"{"event":"disconnect"}"#, LiveEventKind::Disconnect),
        (
            br#"{"event":"new_incident","data":{"id":1,"lat":20.3,"lng":85.8,"severity":"Critical","intensity":10}}"#,
            LiveEventKind::NewIncident,
        ),
        (
            br#"{"event":"reroute_update","data":{"convoyId":42,"path":[[20.3,85.8],[20.31,85.81],[20.32,85.83]]}}"#,
            LiveEventKind::RerouteUpdate,
        ),
        (
            br#"{"event":"convoy_update","data":{"convoy_id":42,"name":"Relief-1","route":[[20.3,85.8],[20.32,85.83]]}}"#,
            LiveEventKind::ConvoyUpdate,
        ),
        (
            br#"{"event":"message","data":{"sid":"Zq1","text":"all clear"}}"#,
            LiveEventKind::Message,
        ),
    ];

    for (frame, expected) in fixtures {
        let event = decode_live_frame(frame).expect("fixture should decode");
        assert_eq!(event.kind(), *expected);
    }
}

#[test]
fn short_reroute_paths_still_decode() {
    // Path length is a routing concern; the decoder only validates points.
    let event = decode_live_frame(br#"{"event":"reroute_update","data":{"convoy_id":7,"path":[]}}"#)
        .expect("empty path should decode");
    assert_eq!(
        event,
        LiveEvent::RerouteUpdate {
            convoy_id: 7,
            path: Vec::new()
        }
    );
}

#[test]
fn malformed_fixtures_are_rejected_without_panicking() {
    let fixtures: &[&[u8]] = &[
        b"",
        b"{",
        b"[]",
        b"{\"data\":{}}",
        br#"{"event":42}"#,
        br#"{"event":"reroute_update","data":{"path":[[1,1]]}}"#,
        br#"{"event":"reroute_update","data":{"convoy_id":1,"path":[[1]]}}"#,
        br#"{"event":"message","data":"bare text"}"#,
        br#"{"event":"new_incident","data":{"id":1,"lat":1,"lng":1,"severity":"Extreme"}}"#,
    ];

    for fixture in fixtures {
        let error = decode_live_frame(fixture).expect_err("fixture should be rejected");
        assert!(
            matches!(
                error,
                WireError::Frame(_) | WireError::Payload { .. } | WireError::Core(_)
            ),
            "unexpected error for {:?}: {error}",
            String::from_utf8_lossy(fixture)
        );
    }
}
