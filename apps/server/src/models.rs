use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ── Domain model ──

/// The closed set of services the shop offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Haircut,
    HaircutBeard,
    HaircutStraightening,
    Highlights,
    Platinum,
    HouseCall,
}

impl ServiceKind {
    /// Customer-facing name.
    pub fn label(self) -> &'static str {
        match self {
            ServiceKind::Haircut => "Corte",
            ServiceKind::HaircutBeard => "Corte + Barba",
            ServiceKind::HaircutStraightening => "Corte + Progressiva",
            ServiceKind::Highlights => "Luzes",
            ServiceKind::Platinum => "Platinado",
            ServiceKind::HouseCall => "Atendimento a Domicílio",
        }
    }

    /// Only house calls need a street address.
    pub fn requires_address(self) -> bool {
        self == ServiceKind::HouseCall
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A service or appointment price: a fixed amount in cents, or "by quote"
/// when the cost is settled outside the system (house calls).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Price {
    Fixed { cents: i64 },
    Quoted,
}

impl Price {
    pub const FREE: Price = Price::Fixed { cents: 0 };

    pub fn fixed(cents: i64) -> Self {
        Price::Fixed { cents }
    }

    /// Numeric amount, `None` for the quoted sentinel.
    pub fn cents(self) -> Option<i64> {
        match self {
            Price::Fixed { cents } => Some(cents),
            Price::Quoted => None,
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Price::Fixed { cents } => f.write_str(&format_cents(*cents)),
            Price::Quoted => f.write_str(QUOTED_LABEL),
        }
    }
}

/// Label shown (and accepted by the admin price editor) for quoted prices.
pub const QUOTED_LABEL: &str = "Sob Consulta";

/// Format cents as `R$ 50.00`.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.abs();
    format!("{}R$ {}.{:02}", sign, abs / 100, abs % 100)
}

/// How the customer intends to pay. Only a label; no money moves here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    PixAdvance,
    PixOnSite,
    Cash,
    DebitCard,
    CreditCard,
    LoyaltyRedemption,
}

impl PaymentMethod {
    /// Methods a customer may pick by hand.
    pub const STANDARD: [PaymentMethod; 5] = [
        PaymentMethod::PixAdvance,
        PaymentMethod::PixOnSite,
        PaymentMethod::Cash,
        PaymentMethod::DebitCard,
        PaymentMethod::CreditCard,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PaymentMethod::PixAdvance => "Pix Antecipado",
            PaymentMethod::PixOnSite => "Pix no Salão",
            PaymentMethod::Cash => "Dinheiro",
            PaymentMethod::DebitCard => "Cartão de Débito",
            PaymentMethod::CreditCard => "Cartão de Crédito",
            PaymentMethod::LoyaltyRedemption => "Resgate Fidelidade (Grátis)",
        }
    }

    pub fn is_pix(self) -> bool {
        matches!(self, PaymentMethod::PixAdvance | PaymentMethod::PixOnSite)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: ServiceKind,
    pub price: Price,
    pub duration_minutes: u32,
    pub description: String,
}

/// Built-in catalog used until the administrator saves one.
pub fn default_catalog() -> Vec<Service> {
    let entry = |id: &str, name, price, duration_minutes, description: &str| Service {
        id: id.to_string(),
        name,
        price,
        duration_minutes,
        description: description.to_string(),
    };

    vec![
        entry(
            "1",
            ServiceKind::Haircut,
            Price::fixed(5000),
            30,
            "Corte moderno personalizado para o seu estilo.",
        ),
        entry(
            "2",
            ServiceKind::HaircutBeard,
            Price::fixed(7000),
            60,
            "O combo completo: cabelo na régua e barba alinhada.",
        ),
        entry(
            "3",
            ServiceKind::HaircutStraightening,
            Price::fixed(9000),
            90,
            "Corte + alisamento progressivo de alta performance.",
        ),
        entry(
            "4",
            ServiceKind::Highlights,
            Price::fixed(6000),
            90,
            "Realce seu visual com reflexos modernos.",
        ),
        entry(
            "5",
            ServiceKind::Platinum,
            Price::fixed(5500),
            120,
            "Estilo radical com descoloração total e matização.",
        ),
        entry(
            "6",
            ServiceKind::HouseCall,
            Price::Quoted,
            60,
            "Conforto total: o barbeiro vai até você. Preço varia conforme a distância.",
        ),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub customer_name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub date: NaiveDate,
    pub time: String,
    pub service: ServiceKind,
    pub price: Price,
    pub payment_method: PaymentMethod,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed: bool,
}

impl Appointment {
    /// wa.me link that opens a pre-filled confirmation message to the
    /// customer. `None` if the link cannot be built.
    pub fn confirmation_link(&self, barber_name: &str) -> Option<String> {
        let digits: String = self.phone.chars().filter(char::is_ascii_digit).collect();
        let first_name = self.customer_name.split_whitespace().next().unwrap_or("");
        let text = format!(
            "E aí {}! Sou o {}, passando pra confirmar seu {} para {} às {}. No aguardo, brabo!",
            first_name,
            barber_name,
            self.service.label(),
            self.date.format("%d/%m/%Y"),
            self.time
        );
        url::Url::parse_with_params(&format!("https://wa.me/{}", digits), &[("text", text)])
            .ok()
            .map(String::from)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryItem {
    pub id: String,
    /// Embedded `data:` URI or a remote URL.
    pub image_url: String,
    pub category: ServiceKind,
    pub barber_name: String,
    pub description: String,
}

/// Static shop details shown on the contact page and in payment hints.
#[derive(Debug, Clone, Serialize)]
pub struct ShopInfo {
    pub address: String,
    pub phone: String,
    pub pix_key: String,
    pub instagram: String,
    pub barber_name: String,
    pub business_hours: Vec<&'static str>,
}

// ── API request/response types ──

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotView {
    pub time: &'static str,
    pub occupied: bool,
}

#[derive(Debug, Deserialize)]
pub struct GalleryQuery {
    pub category: Option<ServiceKind>,
}

#[derive(Debug, Deserialize)]
pub struct ChooseTimeRequest {
    pub date: NaiveDate,
    pub time: String,
}

#[derive(Debug, Deserialize)]
pub struct ChooseServiceRequest {
    pub service: ServiceKind,
}

#[derive(Debug, Deserialize)]
pub struct DetailsRequest {
    pub customer_name: String,
    pub phone: String,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Deserialize)]
pub struct UpdateServiceRequest {
    /// Free text: `50,00`, `R$ 50.00` or `Sob Consulta`.
    pub price: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct AddGalleryItemRequest {
    pub image_url: String,
    pub category: ServiceKind,
    pub barber_name: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfirmQuery {
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub passphrase: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct CustomerSessionRequest {
    pub phone: String,
}

#[derive(Debug, Serialize)]
pub struct CustomerSession {
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatMessageRequest {
    pub message: String,
}

/// Dashboard row: the appointment plus its WhatsApp confirmation link.
#[derive(Debug, Serialize)]
pub struct AdminAppointment {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub confirm_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AdminDashboard {
    pub appointments: Vec<AdminAppointment>,
    pub completed_count: usize,
    pub revenue_cents: i64,
    pub revenue_label: String,
}

#[derive(Debug, Serialize)]
pub struct CustomerPortal {
    pub phone: String,
    pub appointments: Vec<Appointment>,
    pub loyalty: crate::loyalty::LoyaltyStatus,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub ok: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}
