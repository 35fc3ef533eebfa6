use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use tokio::runtime::Runtime; // To run async code within Criterion
use topup_core::{
  transition, CreateOrderRequest, InMemoryOrderStore, OperatorAction, OrderService, OrderStatus, PaymentArtifact,
  PaymentGateway, PaymentSignal, PricingEngine, ServiceSettings, TopupResult, TracingNotifier, TransactionRequest,
  Trigger,
};

// --- Gateway that answers instantly ---
struct InstantGateway;

#[async_trait::async_trait]
impl PaymentGateway for InstantGateway {
  fn name(&self) -> &'static str {
    "instant"
  }

  async fn create_transaction(&self, request: &TransactionRequest) -> TopupResult<PaymentArtifact> {
    Ok(PaymentArtifact {
      token: request.order_id.to_string(),
      redirect_url: String::new(),
    })
  }
}

// --- Benchmark Functions ---

fn bench_quote(c: &mut Criterion) {
  let mut group = c.benchmark_group("Quote");
  let engine = PricingEngine::default();

  for method in ["qris", "bca", "dana", "unknown"] {
    group.throughput(Throughput::Elements(1));
    group.bench_with_input(BenchmarkId::from_parameter(method), &method, |b, method| {
      let mut amount = 100u32;
      b.iter(|| {
        amount = if amount > 100_000 { 100 } else { amount + 37 };
        criterion::black_box(engine.quote(amount, method))
      });
    });
  }
  group.finish();
}

fn bench_transition_table(c: &mut Criterion) {
  let triggers = [
    Trigger::Payment(PaymentSignal::Succeeded),
    Trigger::Payment(PaymentSignal::Failed),
    Trigger::Payment(PaymentSignal::Challenged),
    Trigger::Operator(OperatorAction::MarkFulfilled),
    Trigger::Operator(OperatorAction::Revise),
  ];
  let statuses = [
    OrderStatus::PendingPayment,
    OrderStatus::AwaitingFulfillment,
    OrderStatus::Fulfilled,
    OrderStatus::Failed,
  ];

  c.bench_function("Transition/full_table", |b| {
    b.iter(|| {
      for status in statuses {
        for trigger in triggers {
          criterion::black_box(transition(status, trigger));
        }
      }
    });
  });
}

fn bench_create_order_in_memory(c: &mut Criterion) {
  let mut group = c.benchmark_group("CreateOrderInMemory");
  let rt = Runtime::new().unwrap();
  let service = Arc::new(OrderService::new(
    Arc::new(InMemoryOrderStore::new()),
    Arc::new(InstantGateway),
    Arc::new(TracingNotifier),
    PricingEngine::default(),
    ServiceSettings::default(),
  ));

  group.throughput(Throughput::Elements(1));
  group.bench_function("qris_500", |b| {
    b.to_async(&rt).iter(|| {
      let service = service.clone();
      async move {
        let request = CreateOrderRequest {
          username: "bench_user".to_string(),
          user_id: "1".to_string(),
          email: "bench@example.com".to_string(),
          amount: 500,
          payment_method: "qris".to_string(),
          whatsapp: None,
          gamepass_link: None,
        };
        service.create_order(request).await.unwrap()
      }
    });
  });
  group.finish();
}

criterion_group!(
  benches,
  bench_quote,
  bench_transition_table,
  bench_create_order_in_memory
);
criterion_main!(benches);
