use mwt::{
    ActionCount, GenericExplorer, Interaction, MwtExplorer, Notification, Observation,
    UploaderConfig,
};

pub fn main() -> mwt::Result<()> {
    // Configure env_logger to see upload logs.
    env_logger::Builder::from_env(env_logger::Env::new().default_filter_or("mwt")).init();

    let join_server = std::env::var("MWT_JOIN_SERVER")
        .expect("MWT_JOIN_SERVER env variable should contain join server address");
    let token =
        std::env::var("MWT_APP_TOKEN").expect("MWT_APP_TOKEN env variable should contain token");

    let mut uploader = UploaderConfig::new(join_server)
        .listener(|notification: Notification| match notification {
            Notification::PackageSent { batch } => {
                println!("sent {} events", batch.len());
            }
            Notification::PackageSendFailed { batch, error } => {
                println!("failed to send {} events: {}", batch.len(), error);
            }
        })
        .to_uploader()?;
    uploader.initialize_with_token(&token)?;

    let explorer = MwtExplorer::new("simple-demo", GenericExplorer::new());
    let context = serde_json::json!({"device": "mobile", "hour": 14});

    // Pick one of three layouts for the user. The same user always gets the same draw.
    let decision = explorer.choose_action("user-1", &[0.6, 0.3, 0.1], ActionCount::Fixed(3))?;
    println!(
        "showing layout {} (probability {})",
        decision.action, decision.probability
    );
    uploader.upload(Interaction::from_decision("user-1", decision, context))?;

    // Later, record whether the user clicked.
    uploader.upload(Observation {
        key: "user-1".to_owned(),
        value: serde_json::json!({"clicked": true}),
    })?;

    // Block until every buffered event has been sent or written to the overflow store.
    uploader.shutdown()
}
