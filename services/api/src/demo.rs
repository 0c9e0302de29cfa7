use crate::infra::{
    parse_amount, seed_directory, DEMO_ADMIN, DEMO_MEMBER, DEMO_MEMBER_PROFILE, DEMO_OFFICER,
    DEMO_POLICY,
};
use clap::Args;
use microlend::config::AppConfig;
use microlend::error::AppError;
use microlend::lending::{
    Actor, Directory, InMemoryLoanStore, LendingError, LendingService, Loan, LoanAction,
    LoanApplication, MemberId, Money, PolicyId, RepaymentRequest, UserId,
};
use rust_decimal::Decimal;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Principal requested by the demo member.
    #[arg(long, default_value = "10000", value_parser = parse_amount)]
    pub(crate) principal: Decimal,
    /// Repayment term in months.
    #[arg(long, default_value_t = 12)]
    pub(crate) term_months: u32,
    /// Print the loan detail as JSON after each step.
    #[arg(long)]
    pub(crate) json: bool,
}

struct Printer {
    currency: String,
    json: bool,
}

impl Printer {
    fn amount(&self, value: Money) -> String {
        format!("{} {}", self.currency, value)
    }

    fn loan(&self, label: &str, loan: &Loan) {
        println!(
            "- {label}: {} is {} | balance {} of {}",
            loan.id.0,
            loan.status.label(),
            self.amount(loan.balance),
            self.amount(loan.total_payable)
        );
        if self.json {
            match serde_json::to_string_pretty(loan) {
                Ok(json) => println!("{json}"),
                Err(err) => println!("  Loan payload unavailable: {err}"),
            }
        }
    }
}

fn staff(directory: &impl Directory, user: &str) -> Result<Actor, AppError> {
    directory
        .actor(&UserId(user.to_string()))
        .map_err(LendingError::from)?
        .ok_or(AppError::Lending(LendingError::NotFound("demo user")))
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let printer = Printer {
        currency: config.lending.currency,
        json: args.json,
    };

    let store = Arc::new(InMemoryLoanStore::default());
    let directory = Arc::new(seed_directory()?);
    let service = LendingService::new(store, directory.clone());

    let admin = staff(directory.as_ref(), DEMO_ADMIN)?;
    let officer = staff(directory.as_ref(), DEMO_OFFICER)?;
    let member = staff(directory.as_ref(), DEMO_MEMBER)?;
    let member_id = MemberId(DEMO_MEMBER_PROFILE.to_string());

    println!("Micro-lending walkthrough");
    println!("Policies offered to {}:", member.user().0);
    for policy in service.policies_for_member(&member_id)? {
        println!(
            "  - {} ({}): {} at {} up to {} months, {} to {}",
            policy.name,
            policy.id.0,
            policy.company.0,
            policy.interest_rate,
            policy.max_term_months,
            printer.amount(policy.min_amount),
            printer.amount(policy.max_amount)
        );
    }

    let principal = Money::new(args.principal).map_err(|_| LendingError::InvalidAmount)?;
    let application = LoanApplication {
        policy: PolicyId(DEMO_POLICY.to_string()),
        principal_amount: principal,
        term_months: args.term_months,
        purpose: "Restock market stall".to_string(),
    };
    let loan = match service.create_loan(&member_id, application) {
        Ok(loan) => loan,
        Err(err) => {
            println!("  Application rejected: {err}");
            return Ok(());
        }
    };
    printer.loan("Applied", &loan);

    let loan = service.assign_officer(&admin, &loan.id, officer.user())?;
    println!(
        "- Assigned to {} ({})",
        officer.user().0,
        loan.officer_office().map(|office| office.0.as_str()).unwrap_or("-")
    );

    if let Err(err) = service.transition(&officer, &loan.id, LoanAction::Disburse) {
        println!("- Early disbursement refused: {err}");
    }
    let loan = service.transition(&officer, &loan.id, LoanAction::Approve)?;
    printer.loan("Approved", &loan);
    let loan = service.transition(&officer, &loan.id, LoanAction::Disburse)?;
    printer.loan("Disbursed", &loan);

    let first = (loan.total_payable.value() / Decimal::TWO).round_dp(2);
    let payment = |transaction_id: &str, amount: Decimal| RepaymentRequest {
        transaction_id: transaction_id.to_string(),
        payer_phone: "+254712000001".to_string(),
        amount,
    };

    service.apply_repayment(&loan.id, payment("MPESA-DEMO-0001", first))?;
    printer.loan("First repayment", &service.loan_detail(&member, &loan.id)?.loan);

    if let Err(err) = service.apply_repayment(&loan.id, payment("MPESA-DEMO-0001", first)) {
        println!("- Replayed notification refused: {err}");
    }

    let remaining = service.loan_detail(&member, &loan.id)?.loan.balance.value();
    service.apply_repayment(&loan.id, payment("MPESA-DEMO-0002", remaining))?;
    let detail = service.loan_detail(&member, &loan.id)?;
    printer.loan("Final repayment", &detail.loan);
    println!("  Repayments recorded: {}", detail.repayments.len());

    let summary = service.portfolio_summary(&admin)?;
    println!(
        "Portfolio: {} loans | {} closed | principal {} | repaid {} | outstanding {}",
        summary.total_loans,
        summary.closed_loans,
        printer.amount(summary.total_principal),
        printer.amount(summary.total_repaid),
        printer.amount(summary.outstanding_balance)
    );

    Ok(())
}
