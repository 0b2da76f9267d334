
use helper::StubTransport;
use pretty_assertions::assert_eq;
use query_cache::{
    codec::RequestOptions,
    fetch::{ProxyConnectionState, ProxyStatus},
    FetchConfig, QueryFetch,
};

#[tokio::test]
async fn should_check_proxy_once_for_all_clients_of_a_process() {
    helper::setup_system();
    let proxy_port = testing_utils::get_random_ports(1)[0];
    let proxy_url = format!("http://127.0.0.1:{proxy_port}/");
    let transport = StubTransport::failing_for(proxy_url.clone());
    let build = || {
        QueryFetch::builder(transport.clone())
            .with_config(
                FetchConfig::default()
                    .with_port(proxy_port)
                    .with_build_context(true),
            )
            .build()
    };
    let (first, second) = (build(), build());

    first
        .query_fetch("https://a.com", &RequestOptions::new())
        .await
        .unwrap();
    second
        .query_fetch("https://a.com", &RequestOptions::new())
        .await
        .unwrap();

    let calls = transport.urls();
    assert_eq!(calls.iter().filter(|url| **url == proxy_url).count(), 1);
    assert_eq!(calls.len(), 3);
    assert_eq!(
        ProxyStatus::shared().current(),
        ProxyConnectionState::Unavailable
    );
}
