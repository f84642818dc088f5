use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use tokio_stream::StreamExt;

const FIXTURE: &str = "hci1|00:11:22|Speaker|-65;hci0|AA:BB:CC|Hardware_Password_Manager|-43";

fn fake_client() -> anyhow::Result<Box<dyn bhpm::HardwareClient>> {
    let fake_args = bhpm::FakeArgs::builder().scan_fixture(FIXTURE)?.build();
    Ok(bhpm::fake_hardware_client(fake_args))
}

#[tokio::test]
async fn fake_session_connect_populates_report_metadata() -> anyhow::Result<()> {
    let session = bhpm::SessionHandler::new(fake_client()?)
        .connect_first()
        .await?;
    let report = session.inspect_report();

    assert_eq!(Some("Hardware_Password_Manager"), report.device().local_name());
    assert_eq!("hci0", report.device().adapter_name());
    assert_eq!(
        bhpm::WriteMode::WithResponse,
        report.session_metadata().write_mode()
    );
    assert_eq!(
        Some("6e400002-b5a3-f393-e0a9-e50e24dcca9e"),
        report
            .session_metadata()
            .resolved_endpoint_uuid(bhpm::EndpointId::WriteCharacteristic)
    );
    assert_eq!(
        Some("6e400003-b5a3-f393-e0a9-e50e24dcca9e"),
        report
            .session_metadata()
            .resolved_endpoint_uuid(bhpm::EndpointId::NotifyCharacteristic)
    );
    assert!(report.endpoint_presence().missing().is_empty());

    session.close().await?;

    Ok(())
}

#[tokio::test]
async fn fake_session_answers_exchanges_like_the_firmware() -> anyhow::Result<()> {
    let session = bhpm::SessionHandler::new(fake_client()?)
        .connect_first()
        .await?;
    let endpoint = bhpm::EndpointId::NotifyCharacteristic;
    let mut notifications = session.notifications(endpoint).await?;
    session.subscribe_endpoint(endpoint).await?;
    let codec = bhpm::PacketCodec::default();

    let lookup = bhpm::Request::retrieve("https://test.com", "user@test.com")?;
    let store = bhpm::Request::store("https://test.com", "user@test.com", "1234567890A")?;

    let mut responses = Vec::new();
    for request in [&lookup, &store, &store, &lookup, &lookup] {
        responses.push(
            bhpm::RequestSender::exchange(&session, &mut notifications, codec, request).await?,
        );
    }

    assert_eq!(
        vec![
            bhpm::Response::Status(bhpm::DeviceStatus::OperationRejected),
            bhpm::Response::Status(bhpm::DeviceStatus::OperationRejected),
            bhpm::Response::Status(bhpm::DeviceStatus::Ok),
            bhpm::Response::Status(bhpm::DeviceStatus::OperationRejected),
            bhpm::Response::Password("1234567890A".to_string()),
        ],
        responses
    );

    session.unsubscribe_endpoint(endpoint).await?;
    session.close().await?;

    Ok(())
}

#[tokio::test]
async fn multi_packet_request_produces_a_single_reply() -> anyhow::Result<()> {
    let session = bhpm::SessionHandler::new(fake_client()?)
        .connect_first()
        .await?;
    let endpoint = bhpm::EndpointId::NotifyCharacteristic;
    let mut notifications = session.notifications(endpoint).await?;
    session.subscribe_endpoint(endpoint).await?;

    let request = bhpm::fill_request(10)?;
    let packets = bhpm::RequestSender::send(&session, bhpm::PacketCodec::default(), &request).await?;
    session.unsubscribe_endpoint(endpoint).await?;
    session.close().await?;

    assert_eq!(2, packets);
    let replies: Vec<Vec<u8>> = notifications.collect().await;
    assert_eq!(vec![br#"{"err":"operation rejected"}"#.to_vec()], replies);

    Ok(())
}

#[tokio::test]
async fn connect_fails_when_no_device_matches() -> anyhow::Result<()> {
    let result = bhpm::SessionHandler::new(fake_client()?)
        .with_device_name("Bench_Password_Manager")
        .connect_first()
        .await;

    assert_matches!(
        result,
        Err(bhpm::InteractionError::DeviceNotFound { name }) if name == "Bench_Password_Manager"
    );
    Ok(())
}
