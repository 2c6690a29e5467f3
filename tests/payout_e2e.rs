mod common;

use common::{payout_knowledge_base, payout_rules, sample_payouts, Payout, PayoutInput, PayoutResult};

use kyrorules::{
    ExecutionReport, Expr, FactContext, FactError, FactSource, KnowledgeBase,
    KnowledgeBaseInstance, KnowledgeLibrary, Rule, RuleEngine, RuleError, RuleResult,
};

fn run(
    engine: &RuleEngine,
    instance: &mut KnowledgeBaseInstance,
    input: &mut PayoutInput,
) -> RuleResult<ExecutionReport> {
    let mut ctx = FactContext::new();
    input.register(&mut ctx)?;
    engine.execute(&mut ctx, instance)
}

#[test]
fn first_payout_is_flagged_and_nothing_else() {
    let kb = payout_knowledge_base();
    let mut input = PayoutInput::new(Payout::new(999_999, 0, "jo"));

    let report = run(&RuleEngine::default(), &mut kb.new_instance(), &mut input).unwrap();

    assert_eq!(report.fired, vec!["IsVerified", "IsFirstPayout"]);
    assert_eq!(
        input.result,
        PayoutResult {
            is_first_payout_flagged: true,
            ..PayoutResult::default()
        }
    );
}

#[test]
fn mismatched_payment_method_name_is_flagged() {
    let kb = payout_knowledge_base();
    let mut input = PayoutInput::new(Payout::new(1_000_000, 100_000, "joe"));

    let report = run(&RuleEngine::default(), &mut kb.new_instance(), &mut input).unwrap();

    assert_eq!(report.fired, vec!["IsVerified", "IsKYCNameEqualToPMName"]);
    assert_eq!(
        input.result,
        PayoutResult {
            is_kyc_name_equal_to_pm_name_flagged: true,
            ..PayoutResult::default()
        }
    );
}

#[test]
fn high_amount_fires_first_by_salience() {
    let kb = payout_knowledge_base();
    let mut input = PayoutInput::new(Payout::new(1_000_001, 100_000_000, "jo"));

    let report = run(&RuleEngine::default(), &mut kb.new_instance(), &mut input).unwrap();

    assert_eq!(report.fired, vec!["IsPayoutAmountTooHigh", "IsVerified"]);
    assert!(input.result.is_payout_amount_too_high_flagged);
    assert!(!input.result.is_first_payout_flagged);
    assert!(!input.result.manual_review_payout_amount_flagged);
    assert!(!input.result.is_kyc_name_equal_to_pm_name_flagged);
}

#[test]
fn manual_review_band_is_exclusive() {
    let kb = payout_knowledge_base();
    for (lifetime, expected) in [(500_000, false), (500_001, true), (999_999, true), (1_000_000, false)] {
        let mut input = PayoutInput::new(Payout::new(10, lifetime, "jo"));
        run(&RuleEngine::default(), &mut kb.new_instance(), &mut input).unwrap();
        assert_eq!(
            input.result.manual_review_payout_amount_flagged, expected,
            "lifetime {lifetime}"
        );
    }
}

#[test]
fn bare_field_read_is_a_no_op() {
    let kb = payout_knowledge_base();
    let mut input = PayoutInput::new(Payout::new(10, 10, "jo"));

    let report = run(&RuleEngine::default(), &mut kb.new_instance(), &mut input).unwrap();

    assert_eq!(report.fire_count("IsVerified"), 1);
    assert!(!input.result.is_verified_flagged);
}

#[test]
fn verified_account_skips_verified_rule() {
    let kb = payout_knowledge_base();
    let mut input = PayoutInput::new(Payout::new(10, 10, "jo"));
    input.account.verified = true;

    let report = run(&RuleEngine::default(), &mut kb.new_instance(), &mut input).unwrap();

    assert!(report.fired.is_empty());
    assert_eq!(report.cycles, 0);
}

#[test]
fn shared_instance_matches_fresh_instances() {
    let kb = payout_knowledge_base();
    let engine = RuleEngine::with_max_cycles(500);
    let mut shared = kb.new_instance();

    for payout in sample_payouts() {
        let mut reused = PayoutInput::new(payout.clone());
        let mut fresh = PayoutInput::new(payout);
        let a = run(&engine, &mut shared, &mut reused).unwrap();
        let b = run(&engine, &mut kb.new_instance(), &mut fresh).unwrap();
        assert_eq!(a.fired, b.fired);
        assert_eq!(reused.result, fresh.result);
    }
}

#[test]
fn re_executing_same_input_is_idempotent() {
    let kb = payout_knowledge_base();
    let engine = RuleEngine::default();
    let mut instance = kb.new_instance();
    let mut input = PayoutInput::new(Payout::new(1_000_001, 0, "joe"));

    let first = run(&engine, &mut instance, &mut input).unwrap();
    let after_first = input.result;
    let second = run(&engine, &mut instance, &mut input).unwrap();

    assert_eq!(first.fired, second.fired);
    assert_eq!(input.result, after_first);
    assert!(after_first.is_payout_amount_too_high_flagged);
    assert!(after_first.is_first_payout_flagged);
    assert!(after_first.is_kyc_name_equal_to_pm_name_flagged);
}

#[test]
fn unregistered_fact_aborts_before_any_rule_fires() {
    let mut rules = payout_rules();
    rules.push(
        Rule::builder("IsMerchantBlocked")
            .salience(-5)
            .when(Expr::field("Merchant.Blocked").equals(true))
            .assign("Result.IsVerifiedFlagged", true)
            .retract_self()
            .build()
            .unwrap(),
    );
    let kb = KnowledgeBase::new("PayoutRules", "0.2.0", rules).unwrap();
    let mut input = PayoutInput::new(Payout::new(999_999, 0, "jo"));

    let err = run(&RuleEngine::default(), &mut kb.new_instance(), &mut input).unwrap_err();

    assert_eq!(
        err,
        RuleError::Fact(FactError::FieldNotFound {
            path: "Merchant.Blocked".to_string()
        })
    );
    assert_eq!(input.result, PayoutResult::default());
}

#[test]
fn read_only_fact_rejects_assignment() {
    let rename = Rule::builder("Rename")
        .when(Expr::lit(true))
        .assign("Account.Name", "mallory")
        .retract_self()
        .build()
        .unwrap();
    let kb = KnowledgeBase::new("kb", "1", vec![rename]).unwrap();
    let mut input = PayoutInput::new(Payout::new(1, 1, "jo"));

    let err = run(&RuleEngine::default(), &mut kb.new_instance(), &mut input).unwrap_err();

    assert_eq!(
        err,
        RuleError::Fact(FactError::ReadOnly {
            path: "Account.Name".to_string()
        })
    );
    assert_eq!(input.account.name, "jo");
}

#[test]
fn type_mismatch_on_typed_field() {
    let bad = Rule::builder("Bad")
        .when(Expr::lit(true))
        .assign("Result.IsFirstPayoutFlagged", "yes")
        .retract_self()
        .build()
        .unwrap();
    let kb = KnowledgeBase::new("kb", "1", vec![bad]).unwrap();
    let mut input = PayoutInput::new(Payout::new(1, 1, "jo"));

    let err = run(&RuleEngine::default(), &mut kb.new_instance(), &mut input).unwrap_err();

    assert_eq!(
        err,
        RuleError::Fact(FactError::TypeMismatch {
            path: "Result.IsFirstPayoutFlagged".to_string(),
            expected: "bool".to_string(),
            actual: "string".to_string(),
        })
    );
}

#[test]
fn nested_writes_reach_caller_objects() {
    let bump = Rule::builder("Bump")
        .when(Expr::field("Payout.Amount").less_than(100))
        .assign("Payout.Amount", Expr::field("Payout.Amount") + 10)
        .build()
        .unwrap();
    let kb = KnowledgeBase::new("kb", "1", vec![bump]).unwrap();
    let mut input = PayoutInput::new(Payout::new(5, 0, "jo"));

    let report = run(&RuleEngine::default(), &mut kb.new_instance(), &mut input).unwrap();

    // 5 -> 15 -> ... -> 105: ten firings, then the condition is false.
    assert_eq!(report.cycles, 10);
    assert_eq!(input.payout.amount, 105);
}

#[test]
fn library_instantiates_by_name_and_version() {
    let mut lib = KnowledgeLibrary::new();
    lib.add(payout_knowledge_base()).unwrap();
    let engine = RuleEngine::with_max_cycles(500);

    let mut instance = lib.new_instance("PayoutRules", "0.1.1").unwrap();
    let mut input = PayoutInput::new(Payout::new(999_999, 0, "jo"));
    run(&engine, &mut instance, &mut input).unwrap();
    assert!(input.result.is_first_payout_flagged);

    assert!(lib.new_instance("PayoutRules", "9.9.9").is_err());
}

#[test]
fn json_definition_and_json_facts() {
    let json = serde_json::to_string(&payout_knowledge_base().to_definition()).unwrap();
    let kb = KnowledgeBase::from_json(&json).unwrap();
    assert_eq!(kb.fingerprint(), payout_knowledge_base().fingerprint());

    let mut payout = serde_json::json!({
        "Amount": 999_999,
        "LifetimePayoutAmount": 0,
        "PaymentMethod": { "Name": "jo" }
    });
    let mut account = serde_json::json!({ "Name": "jo", "Verified": false });
    let mut result = serde_json::json!({
        "IsKYCNameEqualToPMNameFlagged": false,
        "IsPayoutAmountTooHighFlagged": false,
        "IsFirstPayoutFlagged": false,
        "ManualReviewPayoutAmountFlagged": false,
        "IsVerifiedFlagged": false
    });

    let mut ctx = FactContext::new();
    ctx.add("Payout", &mut payout).unwrap();
    ctx.add("Account", &mut account).unwrap();
    ctx.add("Result", &mut result).unwrap();
    let report = RuleEngine::default()
        .execute(&mut ctx, &mut kb.new_instance())
        .unwrap();
    drop(ctx);

    assert_eq!(report.fired, vec!["IsVerified", "IsFirstPayout"]);
    assert_eq!(result["IsFirstPayoutFlagged"], serde_json::json!(true));
    assert_eq!(result["IsPayoutAmountTooHighFlagged"], serde_json::json!(false));
}
