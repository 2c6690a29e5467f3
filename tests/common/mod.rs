//! Payout fact model shared by the integration tests.

#![allow(dead_code)]

use kyrorules::{
    Action, Expr, Fact, FactContext, FactError, FactSource, KnowledgeBase, Rule, RuleResult,
    Value,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentMethod {
    pub name: String,
}

impl Fact for PaymentMethod {
    fn field(&self, name: &str) -> Result<Value, FactError> {
        match name {
            "Name" => Ok(Value::from(self.name.as_str())),
            _ => Err(FactError::not_found(name)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payout {
    pub amount: i64,
    pub lifetime_payout_amount: i64,
    pub payment_method: PaymentMethod,
}

impl Payout {
    pub fn new(amount: i64, lifetime_payout_amount: i64, pm_name: &str) -> Self {
        Self {
            amount,
            lifetime_payout_amount,
            payment_method: PaymentMethod {
                name: pm_name.to_string(),
            },
        }
    }
}

impl Fact for Payout {
    fn field(&self, name: &str) -> Result<Value, FactError> {
        match name {
            "Amount" => Ok(Value::Int(self.amount)),
            "LifetimePayoutAmount" => Ok(Value::Int(self.lifetime_payout_amount)),
            "PaymentMethod" => Err(FactError::mismatch(name, "value", "record")),
            _ => Err(FactError::not_found(name)),
        }
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), FactError> {
        let slot = match name {
            "Amount" => &mut self.amount,
            "LifetimePayoutAmount" => &mut self.lifetime_payout_amount,
            _ => return Err(FactError::not_found(name)),
        };
        *slot = value
            .as_int()
            .ok_or_else(|| FactError::mismatch(name, "int", value.type_name()))?;
        Ok(())
    }

    fn nested(&self, name: &str) -> Option<&dyn Fact> {
        match name {
            "PaymentMethod" => Some(&self.payment_method as &dyn Fact),
            _ => None,
        }
    }

    fn nested_mut(&mut self, name: &str) -> Option<&mut dyn Fact> {
        match name {
            "PaymentMethod" => Some(&mut self.payment_method as &mut dyn Fact),
            _ => None,
        }
    }
}

/// Read-only: rules may inspect the account but never change it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Account {
    pub name: String,
    pub verified: bool,
}

impl Fact for Account {
    fn field(&self, name: &str) -> Result<Value, FactError> {
        match name {
            "Name" => Ok(Value::from(self.name.as_str())),
            "Verified" => Ok(Value::Bool(self.verified)),
            _ => Err(FactError::not_found(name)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PayoutResult {
    pub is_kyc_name_equal_to_pm_name_flagged: bool,
    pub is_payout_amount_too_high_flagged: bool,
    pub is_first_payout_flagged: bool,
    pub manual_review_payout_amount_flagged: bool,
    pub is_verified_flagged: bool,
}

impl PayoutResult {
    fn flag(&self, name: &str) -> Option<bool> {
        match name {
            "IsKYCNameEqualToPMNameFlagged" => Some(self.is_kyc_name_equal_to_pm_name_flagged),
            "IsPayoutAmountTooHighFlagged" => Some(self.is_payout_amount_too_high_flagged),
            "IsFirstPayoutFlagged" => Some(self.is_first_payout_flagged),
            "ManualReviewPayoutAmountFlagged" => Some(self.manual_review_payout_amount_flagged),
            "IsVerifiedFlagged" => Some(self.is_verified_flagged),
            _ => None,
        }
    }

    fn flag_mut(&mut self, name: &str) -> Option<&mut bool> {
        match name {
            "IsKYCNameEqualToPMNameFlagged" => Some(&mut self.is_kyc_name_equal_to_pm_name_flagged),
            "IsPayoutAmountTooHighFlagged" => Some(&mut self.is_payout_amount_too_high_flagged),
            "IsFirstPayoutFlagged" => Some(&mut self.is_first_payout_flagged),
            "ManualReviewPayoutAmountFlagged" => {
                Some(&mut self.manual_review_payout_amount_flagged)
            }
            "IsVerifiedFlagged" => Some(&mut self.is_verified_flagged),
            _ => None,
        }
    }
}

impl Fact for PayoutResult {
    fn field(&self, name: &str) -> Result<Value, FactError> {
        self.flag(name)
            .map(Value::Bool)
            .ok_or_else(|| FactError::not_found(name))
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), FactError> {
        let slot = self.flag_mut(name).ok_or_else(|| FactError::not_found(name))?;
        *slot = value
            .as_bool()
            .ok_or_else(|| FactError::mismatch(name, "bool", value.type_name()))?;
        Ok(())
    }
}

/// One unit of work: the facts for a single payout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PayoutInput {
    pub account: Account,
    pub payout: Payout,
    pub result: PayoutResult,
}

impl PayoutInput {
    pub fn new(payout: Payout) -> Self {
        Self {
            account: Account {
                name: "jo".to_string(),
                verified: false,
            },
            payout,
            result: PayoutResult::default(),
        }
    }
}

impl FactSource for PayoutInput {
    fn register<'a>(&'a mut self, ctx: &mut FactContext<'a>) -> RuleResult<()> {
        ctx.add("Result", &mut self.result)?;
        ctx.add("Account", &mut self.account)?;
        ctx.add("Payout", &mut self.payout)?;
        Ok(())
    }
}

/// The three sample payouts.
pub fn sample_payouts() -> Vec<Payout> {
    vec![
        Payout::new(999_999, 0, "jo"),
        Payout::new(1_000_000, 100_000, "joe"),
        Payout::new(1_000_001, 100_000_000, "jo"),
    ]
}

pub fn payout_rules() -> Vec<Rule> {
    vec![
        Rule::builder("IsKYCNameEqualToPMName")
            .description("KYC Name Equal to Payment Method Name")
            .when(Expr::field("Payout.PaymentMethod.Name").not_equals(Expr::field("Account.Name")))
            .assign("Result.IsKYCNameEqualToPMNameFlagged", true)
            .retract_self()
            .build()
            .unwrap(),
        Rule::builder("IsPayoutAmountTooHigh")
            .description("Payout Amount Too High")
            .salience(10)
            .when(Expr::field("Payout.Amount").greater_than(1_000_000))
            .assign("Result.IsPayoutAmountTooHighFlagged", true)
            .retract_self()
            .build()
            .unwrap(),
        Rule::builder("IsFirstPayout")
            .description("First Payout")
            .salience(1)
            .when(Expr::field("Payout.LifetimePayoutAmount").equals(0))
            .assign("Result.IsFirstPayoutFlagged", true)
            .retract_self()
            .build()
            .unwrap(),
        Rule::builder("ManualReviewPayoutAmount")
            .description("Manual Review Payout")
            .salience(2)
            .when(
                Expr::field("Payout.LifetimePayoutAmount")
                    .greater_than(500_000)
                    .and(Expr::field("Payout.LifetimePayoutAmount").less_than(1_000_000)),
            )
            .assign("Result.ManualReviewPayoutAmountFlagged", true)
            .retract_self()
            .build()
            .unwrap(),
        Rule::builder("IsVerified")
            .description("Verified")
            .salience(5)
            .when(Expr::field("Account.Verified").equals(false))
            .then(Action::evaluate(Expr::field("Result.IsVerifiedFlagged")))
            .retract_self()
            .build()
            .unwrap(),
    ]
}

pub fn payout_knowledge_base() -> KnowledgeBase {
    KnowledgeBase::new("PayoutRules", "0.1.1", payout_rules()).unwrap()
}
