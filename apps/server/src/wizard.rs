//! Five-step booking wizard: time → service → details → payment → review.
//!
//! `Step` holds only values that passed their guard, so e.g. a payment can
//! never exist without a service. Raw inputs live in `Draft` and survive
//! back/forward navigation; every advance re-validates them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::models::{Appointment, PaymentMethod, Price, Service, ServiceKind, SlotView};
use crate::pricing;

/// Phones shorter than this do not trigger a loyalty lookup.
const MIN_PHONE_LEN_FOR_LOYALTY: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    SelectTime,
    SelectService,
    EnterDetails,
    SelectPayment,
    Review,
}

impl StepName {
    /// 1-based position shown in the progress bar.
    pub fn number(self) -> u8 {
        match self {
            StepName::SelectTime => 1,
            StepName::SelectService => 2,
            StepName::EnterDetails => 3,
            StepName::SelectPayment => 4,
            StepName::Review => 5,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WizardError {
    #[error("ação indisponível nesta etapa (etapa atual: {actual:?})")]
    WrongStep { expected: StepName, actual: StepName },
    #[error("já está na primeira etapa")]
    AtFirstStep,
    #[error("escolha um horário")]
    TimeNotChosen,
    #[error("horário fora do expediente: {0}")]
    OutsideBusinessHours(String),
    #[error("não é possível agendar em data passada")]
    DateInPast,
    #[error("horário já ocupado")]
    SlotTaken,
    #[error("escolha um serviço")]
    ServiceNotChosen,
    #[error("informe seu nome")]
    NameRequired,
    #[error("informe seu WhatsApp")]
    PhoneRequired,
    #[error("informe o endereço para atendimento a domicílio")]
    AddressRequired,
    #[error("escolha a forma de pagamento")]
    PaymentNotChosen,
    #[error("confirme o resgate do corte grátis")]
    RedemptionRequired,
    #[error("resgate de fidelidade indisponível")]
    RedemptionNotAvailable,
    #[error("o corte grátis já foi resgatado, volte e escolha outra forma de pagamento")]
    RewardAlreadyUsed,
}

/// Loyalty lookup for a typed phone. Numbers too short to identify anyone
/// never carry a reward.
fn reward_for(appointments: &[Appointment], phone: &str) -> bool {
    let phone = phone.trim();
    phone.chars().count() >= MIN_PHONE_LEN_FOR_LOYALTY
        && pricing::loyalty_eligible(appointments, phone)
}

/// Raw, possibly invalid inputs collected so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Draft {
    pub date: NaiveDate,
    pub time: Option<String>,
    pub service: Option<ServiceKind>,
    pub customer_name: String,
    pub phone: String,
    pub address: String,
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub date: NaiveDate,
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub name: String,
    pub phone: String,
    /// Set only for house calls.
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    SelectTime,
    SelectService {
        slot: Slot,
    },
    EnterDetails {
        slot: Slot,
        service: ServiceKind,
    },
    SelectPayment {
        slot: Slot,
        service: ServiceKind,
        customer: Customer,
    },
    Review {
        slot: Slot,
        service: ServiceKind,
        customer: Customer,
        payment: PaymentMethod,
    },
}

impl Step {
    fn name(&self) -> StepName {
        match self {
            Step::SelectTime => StepName::SelectTime,
            Step::SelectService { .. } => StepName::SelectService,
            Step::EnterDetails { .. } => StepName::EnterDetails,
            Step::SelectPayment { .. } => StepName::SelectPayment,
            Step::Review { .. } => StepName::Review,
        }
    }
}

/// Confirmation card shown at the review step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewSummary {
    pub service: &'static str,
    pub date: NaiveDate,
    pub time: String,
    pub address: Option<String>,
    pub price: Price,
    pub total: String,
    pub payment: &'static str,
    /// Shown when paying by PIX or when the house-call fee is settled by PIX.
    pub pix_key: Option<String>,
}

/// Everything a client needs to render the current step.
#[derive(Debug, Clone, Serialize)]
pub struct WizardView {
    pub step: StepName,
    pub step_number: u8,
    pub draft: Draft,
    pub loyalty_reward: bool,
    pub redemption: bool,
    pub slots: Vec<SlotView>,
    pub price: Option<Price>,
    pub payment_options: Vec<PaymentMethod>,
    pub can_advance: bool,
    pub blocker: Option<String>,
    pub summary: Option<ReviewSummary>,
}

#[derive(Debug, Clone)]
pub struct BookingWizard {
    step: Step,
    draft: Draft,
    loyalty_reward: bool,
}

impl BookingWizard {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            step: Step::SelectTime,
            draft: Draft {
                date: today,
                time: None,
                service: None,
                customer_name: String::new(),
                phone: String::new(),
                address: String::new(),
                payment_method: None,
            },
            loyalty_reward: false,
        }
    }

    pub fn step(&self) -> StepName {
        self.step.name()
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn loyalty_reward(&self) -> bool {
        self.loyalty_reward
    }

    /// Whether this booking is the free-haircut redemption.
    pub fn is_redemption(&self) -> bool {
        self.draft
            .service
            .is_some_and(|service| pricing::is_redemption(service, self.loyalty_reward))
    }

    fn expect_step(&self, expected: StepName) -> Result<(), WizardError> {
        let actual = self.step.name();
        if actual == expected {
            Ok(())
        } else {
            Err(WizardError::WrongStep { expected, actual })
        }
    }

    // ── Field edits ──

    pub fn choose_time(&mut self, date: NaiveDate, time: &str) -> Result<(), WizardError> {
        self.expect_step(StepName::SelectTime)?;
        self.draft.date = date;
        self.draft.time = Some(time.trim().to_string());
        Ok(())
    }

    pub fn choose_service(&mut self, service: ServiceKind) -> Result<(), WizardError> {
        self.expect_step(StepName::SelectService)?;
        self.draft.service = Some(service);
        Ok(())
    }

    /// Record contact details and refresh loyalty eligibility for the phone.
    pub fn enter_details(
        &mut self,
        appointments: &[Appointment],
        customer_name: &str,
        phone: &str,
        address: Option<&str>,
    ) -> Result<(), WizardError> {
        self.expect_step(StepName::EnterDetails)?;
        self.draft.customer_name = customer_name.to_string();
        self.draft.phone = phone.to_string();
        if let Some(address) = address {
            self.draft.address = address.to_string();
        }

        self.loyalty_reward = reward_for(appointments, &self.draft.phone);
        Ok(())
    }

    pub fn choose_payment(&mut self, method: PaymentMethod) -> Result<(), WizardError> {
        self.expect_step(StepName::SelectPayment)?;
        self.draft.payment_method = Some(method);
        Ok(())
    }

    // ── Navigation ──

    /// Evaluate the guard of the current step without moving.
    fn next_step(&self, appointments: &[Appointment], today: NaiveDate) -> Result<Step, WizardError> {
        match &self.step {
            Step::SelectTime => {
                let time = self
                    .draft
                    .time
                    .as_deref()
                    .filter(|t| !t.is_empty())
                    .ok_or(WizardError::TimeNotChosen)?;
                if !pricing::is_business_hour(time) {
                    return Err(WizardError::OutsideBusinessHours(time.to_string()));
                }
                if self.draft.date < today {
                    return Err(WizardError::DateInPast);
                }
                if pricing::is_slot_occupied(appointments, self.draft.date, time) {
                    return Err(WizardError::SlotTaken);
                }
                Ok(Step::SelectService {
                    slot: Slot {
                        date: self.draft.date,
                        time: time.to_string(),
                    },
                })
            }
            Step::SelectService { slot } => {
                let service = self.draft.service.ok_or(WizardError::ServiceNotChosen)?;
                Ok(Step::EnterDetails {
                    slot: slot.clone(),
                    service,
                })
            }
            Step::EnterDetails { slot, service } => {
                let customer = self.validated_customer(*service)?;
                Ok(Step::SelectPayment {
                    slot: slot.clone(),
                    service: *service,
                    customer,
                })
            }
            Step::SelectPayment {
                slot,
                service,
                customer,
            } => {
                let payment = self
                    .draft
                    .payment_method
                    .ok_or(WizardError::PaymentNotChosen)?;
                let redemption = pricing::is_redemption(*service, self.loyalty_reward);
                match (redemption, payment) {
                    (true, PaymentMethod::LoyaltyRedemption) => {}
                    (true, _) => return Err(WizardError::RedemptionRequired),
                    (false, PaymentMethod::LoyaltyRedemption) => {
                        return Err(WizardError::RedemptionNotAvailable)
                    }
                    (false, _) => {}
                }
                Ok(Step::Review {
                    slot: slot.clone(),
                    service: *service,
                    customer: customer.clone(),
                    payment,
                })
            }
            Step::Review { .. } => Err(WizardError::WrongStep {
                expected: StepName::SelectPayment,
                actual: StepName::Review,
            }),
        }
    }

    fn validated_customer(&self, service: ServiceKind) -> Result<Customer, WizardError> {
        let name = self.draft.customer_name.trim();
        if name.is_empty() {
            return Err(WizardError::NameRequired);
        }
        let phone = self.draft.phone.trim();
        if phone.is_empty() {
            return Err(WizardError::PhoneRequired);
        }
        let address = if service.requires_address() {
            let address = self.draft.address.trim();
            if address.is_empty() {
                return Err(WizardError::AddressRequired);
            }
            Some(address.to_string())
        } else {
            None
        };
        Ok(Customer {
            name: name.to_string(),
            phone: phone.to_string(),
            address,
        })
    }

    /// Move one step forward if the current step's guard holds.
    pub fn advance(
        &mut self,
        appointments: &[Appointment],
        today: NaiveDate,
    ) -> Result<StepName, WizardError> {
        let next = self.next_step(appointments, today)?;
        if let Step::SelectPayment { customer, .. } = &next {
            self.loyalty_reward = reward_for(appointments, &customer.phone);
        }
        self.step = next;
        Ok(self.step.name())
    }

    /// Move one step back, keeping every entered value in the draft.
    pub fn back(&mut self) -> Result<StepName, WizardError> {
        let previous = match &self.step {
            Step::SelectTime => return Err(WizardError::AtFirstStep),
            Step::SelectService { .. } => Step::SelectTime,
            Step::EnterDetails { slot, .. } => Step::SelectService { slot: slot.clone() },
            Step::SelectPayment { slot, service, .. } => Step::EnterDetails {
                slot: slot.clone(),
                service: *service,
            },
            Step::Review {
                slot,
                service,
                customer,
                ..
            } => Step::SelectPayment {
                slot: slot.clone(),
                service: *service,
                customer: customer.clone(),
            },
        };
        self.step = previous;
        Ok(self.step.name())
    }

    /// Build the finished appointment. Only legal at the review step.
    ///
    /// The reward is checked again against `appointments`, which must be the
    /// live list: another booking may have spent it since details were entered.
    pub fn submit(
        &self,
        appointments: &[Appointment],
        catalog: &[Service],
        id: String,
        now: DateTime<Utc>,
    ) -> Result<Appointment, WizardError> {
        let Step::Review {
            slot,
            service,
            customer,
            payment,
        } = &self.step
        else {
            return Err(WizardError::WrongStep {
                expected: StepName::Review,
                actual: self.step.name(),
            });
        };

        let redemption = pricing::is_redemption(*service, self.loyalty_reward);
        if redemption && !reward_for(appointments, &customer.phone) {
            return Err(WizardError::RewardAlreadyUsed);
        }
        Ok(Appointment {
            id,
            customer_name: customer.name.clone(),
            phone: customer.phone.clone(),
            address: customer.address.clone(),
            date: slot.date,
            time: slot.time.clone(),
            service: *service,
            price: pricing::current_price(catalog, *service, self.loyalty_reward),
            payment_method: if redemption {
                PaymentMethod::LoyaltyRedemption
            } else {
                *payment
            },
            created_at: now,
            completed: false,
        })
    }

    // ── Presentation ──

    pub fn summary(&self, catalog: &[Service], pix_key: &str) -> Option<ReviewSummary> {
        let Step::Review {
            slot,
            service,
            customer,
            payment,
        } = &self.step
        else {
            return None;
        };

        let price = pricing::current_price(catalog, *service, self.loyalty_reward);
        let show_pix = payment.is_pix() || service.requires_address();
        Some(ReviewSummary {
            service: service.label(),
            date: slot.date,
            time: slot.time.clone(),
            address: customer.address.clone(),
            price,
            total: price.to_string(),
            payment: payment.label(),
            pix_key: show_pix.then(|| pix_key.to_string()),
        })
    }

    pub fn view(
        &self,
        appointments: &[Appointment],
        catalog: &[Service],
        today: NaiveDate,
        pix_key: &str,
    ) -> WizardView {
        let step = self.step();
        let redemption = self.is_redemption();
        let blocker = match step {
            StepName::Review => None,
            _ => self.next_step(appointments, today).err().map(|e| e.to_string()),
        };
        let payment_options = if redemption {
            vec![PaymentMethod::LoyaltyRedemption]
        } else {
            PaymentMethod::STANDARD.to_vec()
        };

        WizardView {
            step,
            step_number: step.number(),
            draft: self.draft().clone(),
            loyalty_reward: self.loyalty_reward(),
            redemption,
            slots: pricing::day_slots(appointments, self.draft.date),
            price: self
                .draft
                .service
                .map(|service| pricing::current_price(catalog, service, self.loyalty_reward)),
            payment_options,
            can_advance: step != StepName::Review && blocker.is_none(),
            blocker,
            summary: self.summary(catalog, pix_key),
        }
    }
}
