//! Association negotiation tests over loopback TCP.
use medicom_ul::association::client::ClientAssociationOptions;
use medicom_ul::association::server::ServerAssociationOptions;
use medicom_ul::association::{Error, State};
use medicom_ul::pdu::{PDataValue, PDataValueType, Pdu};
use tokio::net::TcpListener;

const VERIFICATION: &str = "1.2.840.10008.1.1";
const IMPLICIT_LE: &str = "1.2.840.10008.1.2";
const EXPLICIT_LE: &str = "1.2.840.10008.1.2.1";

async fn loopback_listener() -> (TcpListener, std::net::SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn negotiate_establish_and_release() {
    let (listener, addr) = loopback_listener().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut association = ServerAssociationOptions::new()
            .ae_title("TEST-SCP")
            .establish(stream)
            .await
            .unwrap();
        assert_eq!(association.calling_ae_title(), "TEST-SCU");
        assert_eq!(association.presentation_contexts().len(), 1);

        // expect release and confirm it
        match association.receive().await.unwrap() {
            Pdu::ReleaseRQ => association.confirm_release().await.unwrap(),
            pdu => panic!("unexpected PDU {:?}", pdu),
        }
    });

    let association = ClientAssociationOptions::new()
        .calling_ae_title("TEST-SCU")
        .called_ae_title("TEST-SCP")
        .with_presentation_context(VERIFICATION, vec![EXPLICIT_LE, IMPLICIT_LE])
        .establish(addr)
        .await
        .unwrap();

    assert_eq!(association.state(), State::Established);
    let contexts = association.presentation_contexts();
    assert_eq!(contexts.len(), 1);
    assert_eq!(contexts[0].abstract_syntax, VERIFICATION);
    // the SCP honors the proposer's preference order
    assert_eq!(contexts[0].transfer_syntax, EXPLICIT_LE);

    association.release().await.unwrap();
    server.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn p_data_flows_in_both_directions() {
    let (listener, addr) = loopback_listener().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut association = ServerAssociationOptions::new().establish(stream).await.unwrap();
        // echo one P-DATA back
        let pdu = association.receive().await.unwrap();
        association.send(&pdu).await.unwrap();
        match association.receive().await {
            Ok(Pdu::ReleaseRQ) => association.confirm_release().await.unwrap(),
            other => panic!("unexpected {:?}", other),
        }
    });

    let mut association = ClientAssociationOptions::new()
        .with_presentation_context(VERIFICATION, vec![IMPLICIT_LE])
        .establish(addr)
        .await
        .unwrap();

    let payload = Pdu::PData {
        data: vec![PDataValue {
            presentation_context_id: 1,
            value_type: PDataValueType::Command,
            is_last: true,
            data: vec![1, 2, 3, 4],
        }],
    };
    association.send(&payload).await.unwrap();
    let echoed = association.receive().await.unwrap();
    assert_eq!(echoed, payload);

    association.release().await.unwrap();
    server.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blocked_calling_ae_is_rejected() {
    let (listener, addr) = loopback_listener().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let result = ServerAssociationOptions::new()
            .block_calling_aes(vec!["EVIL-SCU"])
            .establish(stream)
            .await;
        assert!(matches!(result, Err(Error::Rejected { .. })));
    });

    let result = ClientAssociationOptions::new()
        .calling_ae_title("EVIL-SCU")
        .with_presentation_context(VERIFICATION, vec![IMPLICIT_LE])
        .establish(addr)
        .await;
    assert!(matches!(result, Err(Error::Rejected { .. })));
    server.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unsupported_transfer_syntax_rejects_the_context() {
    let (listener, addr) = loopback_listener().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        // SCP only admits explicit little endian
        let result = ServerAssociationOptions::new()
            .accept_transfer_syntaxes(vec![EXPLICIT_LE])
            .establish(stream)
            .await;
        // negotiation concludes, but no context was accepted
        let _ = result;
    });

    let result = ClientAssociationOptions::new()
        .with_presentation_context(VERIFICATION, vec!["1.2.840.10008.1.2.2"])
        .establish(addr)
        .await;
    assert!(matches!(
        result,
        Err(Error::NoAcceptedPresentationContexts { .. })
    ));
    server.await.unwrap();
}
