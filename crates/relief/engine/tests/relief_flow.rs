//! End-to-end lifecycle: platform setup, NGO onboarding, disaster,
//! verification consensus, pooled donation, locked distribution, claims,
//! and reclaim, with the audit log checked along the way.

use chrono::{DateTime, Duration, TimeZone, Utc};
use relief_engine::{ApprovalOutcome, ReliefEngine};
use relief_engine::beneficiaries::BeneficiaryIntake;
use relief_engine::pools::PoolParams;
use relief_engine::registry::PlatformParams;
use relief_types::{
    ActorId, AssetId, DisasterId, DistributionStrategy, GeoLocation, PoolId, ReliefError,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
}

fn actor(s: &str) -> ActorId {
    ActorId::new(s)
}

fn setup() -> (ReliefEngine, DisasterId, PoolId) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let mut engine = ReliefEngine::new();
    engine
        .initialize_platform(
            PlatformParams {
                name: "Relief Ledger".into(),
                admin: actor("admin"),
                fee_recipient: actor("treasury"),
                primary_asset: AssetId::new("usdc"),
                base_fee_bps: 100,
                min_donation: 10,
                max_donation: 10_000_000,
                verification_threshold: 2,
                max_verifiers: 5,
            },
            t0(),
        )
        .unwrap();

    let disaster = DisasterId::new("cyclone-2024");
    engine
        .declare_disaster(
            &actor("admin"),
            disaster.clone(),
            "Cyclone Remal",
            8,
            GeoLocation {
                latitude: 21.9,
                longitude: 89.2,
            },
            t0(),
        )
        .unwrap();

    engine
        .register_ngo(actor("ngo-1"), "Coastal Aid", "REG-77", "help@coastal.org", t0())
        .unwrap();
    engine
        .verify_ngo(&actor("admin"), &actor("ngo-1"), t0() + Duration::seconds(1))
        .unwrap();
    for agent in ["agent-1", "agent-2", "agent-3"] {
        engine
            .register_field_agent(&actor("ngo-1"), actor(agent), agent, t0())
            .unwrap();
    }

    (engine, disaster, PoolId::new("cash-1"))
}

fn register_and_verify(engine: &mut ReliefEngine, disaster: &DisasterId, who: &str, family: u8) {
    engine
        .register_beneficiary(
            &actor("agent-1"),
            BeneficiaryIntake {
                authority: actor(who),
                disaster: disaster.clone(),
                name: who.to_string(),
                phone_number: format!("phone-{who}"),
                national_id: format!("nid-{who}"),
                family_size: family,
                damage_severity: 7,
                age: 40,
            },
            t0(),
        )
        .unwrap();
    let first = engine
        .submit_approval(&actor("agent-2"), &actor(who), disaster, t0())
        .unwrap();
    assert!(matches!(first, ApprovalOutcome::Recorded { approvals: 1, threshold: 2 }));
    let second = engine
        .submit_approval(&actor("agent-3"), &actor(who), disaster, t0())
        .unwrap();
    assert!(matches!(second, ApprovalOutcome::Verified { approvals: 2 }));
}

#[test]
fn full_relief_cycle_conserves_funds() {
    let (mut engine, disaster, pool) = setup();
    register_and_verify(&mut engine, &disaster, "ben-a", 2);
    register_and_verify(&mut engine, &disaster, "ben-b", 5);

    engine
        .create_pool(
            &actor("ngo-1"),
            PoolParams {
                id: pool.clone(),
                disaster: disaster.clone(),
                name: "Cash Assistance".into(),
                asset: AssetId::new("usdc"),
                strategy: DistributionStrategy::WeightedByFamilySize,
                immediate_pct: 70,
                locked_pct: 30,
                time_lock_secs: Some(24 * 3600),
                min_family_size: None,
                min_damage_severity: None,
            },
            t0(),
        )
        .unwrap();

    // Verified NGO pool: 150 bps fee on 100_000 leaves 98_500 deposited.
    engine
        .donate_to_pool(
            &actor("donor"),
            &disaster,
            &pool,
            &AssetId::new("usdc"),
            100_000,
            false,
            Some("for the coast"),
            t0(),
        )
        .unwrap();

    for b in ["ben-a", "ben-b"] {
        engine
            .register_for_pool(&actor("ngo-1"), &disaster, &pool, &actor(b), t0())
            .unwrap();
    }
    engine
        .lock_pool_registrations(&actor("ngo-1"), &disaster, &pool, t0())
        .unwrap();

    // Weights 2 and 5 over a frozen total of 7.
    let a = engine
        .distribute_to_beneficiary(&actor("ngo-1"), &disaster, &pool, &actor("ben-a"), t0())
        .unwrap();
    let b = engine
        .distribute_to_beneficiary(&actor("ngo-1"), &disaster, &pool, &actor("ben-b"), t0())
        .unwrap();
    assert_eq!(a, 98_500 * 2 / 7);
    assert_eq!(b, 98_500 * 5 / 7);
    assert!(a + b <= 98_500);

    // ben-a claims the immediate share now and the locked share after the
    // one-day lock.
    let paid_now = engine
        .claim_distribution(&actor("ben-a"), &disaster, &pool, t0())
        .unwrap();
    assert_eq!(paid_now, a * 70 / 100);
    let paid_later = engine
        .claim_distribution(&actor("ben-a"), &disaster, &pool, t0() + Duration::days(2))
        .unwrap();
    assert_eq!(paid_now + paid_later, a);

    // ben-b never claims; after the deadline the authority reclaims all of
    // it back into the pool.
    let reclaimed = engine
        .reclaim_expired_distribution(
            &actor("ngo-1"),
            &disaster,
            &pool,
            &actor("ben-b"),
            t0() + Duration::days(91),
        )
        .unwrap();
    assert_eq!(reclaimed, b);

    // Ledger-level accounting: claimed plus still-outstanding never
    // exceeds what was deposited.
    let store = engine.store();
    let tx = store.begin();
    let relief_store::Record::Pool(pool_record) = tx
        .read(&relief_store::RecordKey::Pool(disaster.clone(), pool.clone()))
        .unwrap()
    else {
        panic!("expected pool record");
    };
    assert_eq!(pool_record.total_claimed, a);
    assert_eq!(pool_record.total_distributed, a);
    assert!(pool_record.total_claimed <= pool_record.total_deposited);
}

#[test]
fn audit_log_grows_with_privileged_actions_only() {
    let (mut engine, disaster, _) = setup();
    // setup() performed two audited actions: CreateDisaster and VerifyNgo.
    assert_eq!(engine.admin_actions().len(), 2);

    // A beneficiary registration is not privileged.
    register_and_verify(&mut engine, &disaster, "ben-a", 3);
    assert_eq!(engine.admin_actions().len(), 2);

    engine
        .pause_platform(&actor("admin"), "drill", t0() + Duration::seconds(10))
        .unwrap();
    engine
        .unpause_platform(&actor("admin"), t0() + Duration::seconds(11))
        .unwrap();
    assert_eq!(engine.admin_actions().len(), 4);
}

#[test]
fn admin_handover_preserves_governance() {
    let (mut engine, _, _) = setup();
    engine
        .initiate_admin_transfer(&actor("admin"), actor("admin-2"), t0() + Duration::seconds(5))
        .unwrap();
    engine
        .accept_admin_transfer(&actor("admin-2"), t0() + Duration::days(3))
        .unwrap();

    // The new admin governs; the old one is locked out.
    let err = engine
        .pause_platform(&actor("admin"), "nope", t0() + Duration::days(4))
        .unwrap_err();
    assert!(matches!(err, ReliefError::UnauthorizedAdmin(_)));
    engine
        .pause_platform(&actor("admin-2"), "maintenance", t0() + Duration::days(4))
        .unwrap();
}

#[test]
fn paused_platform_freezes_the_whole_flow() {
    let (mut engine, disaster, pool) = setup();
    register_and_verify(&mut engine, &disaster, "ben-a", 2);
    engine
        .pause_platform(&actor("admin"), "incident", t0() + Duration::seconds(30))
        .unwrap();

    let err = engine
        .create_pool(
            &actor("ngo-1"),
            PoolParams {
                id: pool.clone(),
                disaster: disaster.clone(),
                name: "Cash".into(),
                asset: AssetId::new("usdc"),
                strategy: DistributionStrategy::Equal,
                immediate_pct: 100,
                locked_pct: 0,
                time_lock_secs: None,
                min_family_size: None,
                min_damage_severity: None,
            },
            t0() + Duration::minutes(1),
        )
        .unwrap_err();
    assert!(matches!(err, ReliefError::PlatformPaused));

    let err = engine
        .submit_approval(&actor("agent-2"), &actor("ben-a"), &disaster, t0() + Duration::minutes(1))
        .unwrap_err();
    assert!(matches!(err, ReliefError::PlatformPaused));
}
